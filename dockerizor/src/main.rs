use anyhow::{anyhow, Result};
use crossterm::{
    style::{self, Colorize, Styler},
    QueueableCommand,
};
use log::{info, warn};
use std::{
    env,
    io::{self, stdout, BufReader, Write},
    path::PathBuf,
    process,
};
use structopt::StructOpt;

use dockerizor::{
    backends::{DockerBackend, OfflineDaemon, ShellRunner},
    builders::center::{SecretMethod, ServiceOptions},
    center::CenterManager,
    configurators::{self, center, COMPOSE_FILE},
    controller::{Controller, DryRun},
    prompt::{ConsolePrompt, NonInteractive, Prompt},
    services::DaemonClient,
};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "dockerizor",
    about = "Generates docker-compose files and Dockerfiles for PHP and Node applications."
)]
enum Opt {
    /// Detects the project in the working directory and containerizes it.
    Dockerize {
        #[structopt(long)]
        /// Report what would be written and run without doing it.
        dry_run: bool,

        #[structopt(short, long)]
        /// Answer every question with its default.
        no_interaction: bool,

        #[structopt(long, parse(from_os_str))]
        workdir: Option<PathBuf>,
    },
    /// Manages the proxy and services shared by all applications.
    Center(CenterOpt),
}

#[derive(Debug, StructOpt)]
enum CenterOpt {
    /// Creates the shared networks and adds the traefik proxy.
    Install {
        #[structopt(long)]
        /// Domain whose subdomains the proxy serves, e.g. apps.test.
        wildcard: Option<String>,

        #[structopt(flatten)]
        common: CenterCommon,
    },
    /// Adds a tool or backend service from the catalog.
    AddService {
        slug: String,

        #[structopt(long, default_value = "latest")]
        version: String,

        #[structopt(flatten)]
        service: ServiceOpt,

        #[structopt(flatten)]
        common: CenterCommon,
    },
    /// Adds a database server applications can join.
    AddDatabase {
        system: String,

        #[structopt(long, default_value = "latest")]
        version: String,

        #[structopt(long)]
        /// Root password to store when the secret is created.
        password: Option<String>,

        #[structopt(flatten)]
        common: CenterCommon,
    },
}

#[derive(Debug, StructOpt)]
struct ServiceOpt {
    #[structopt(long)]
    /// Root password to store when the secret is created.
    password: Option<String>,

    #[structopt(long)]
    /// Existing secret to mount instead of a generated one.
    secret: Option<String>,

    #[structopt(long, default_value = "secret")]
    /// How applications read the secret: secret or vault.
    secret_method: SecretMethod,

    #[structopt(long)]
    /// Named volume, host path, or `source:target` mount for the data.
    volume: Option<String>,

    #[structopt(long)]
    /// Also attach the service to the frontend network.
    frontend: bool,
}

impl From<&ServiceOpt> for ServiceOptions {
    fn from(opt: &ServiceOpt) -> Self {
        ServiceOptions {
            password: opt.password.clone(),
            secret: opt.secret.clone(),
            secret_method: opt.secret_method,
            volume: opt.volume.clone(),
            frontend: opt.frontend,
        }
    }
}

#[derive(Debug, StructOpt)]
struct CenterCommon {
    #[structopt(long)]
    dry_run: bool,

    #[structopt(short, long)]
    no_interaction: bool,

    #[structopt(long, parse(from_os_str))]
    /// Directory holding the center's compose file.
    dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    pretty_env_logger::init_custom_env("LOG");

    let opt = Opt::from_args();

    if let Err(err) = run(opt) {
        io::stderr()
            .queue(style::PrintStyledContent("ERROR: ".red().bold()))?
            .queue(style::Print(format!("{:#}\n", err)))?
            .flush()?;
        process::exit(1);
    }

    Ok(())
}

fn run(opt: Opt) -> Result<()> {
    match opt {
        Opt::Dockerize {
            dry_run,
            no_interaction,
            workdir,
        } => {
            let workdir = resolve_directory(workdir)?;
            info!("found work directory {:?}", workdir);

            let dry_run = DryRun::new(dry_run);
            let daemon = connect();
            let manager = CenterManager::new(&*daemon, dry_run);
            let mut prompt = prompt(no_interaction);

            match configurators::dockerize(&workdir, &manager, prompt.as_mut())? {
                Some(app) => controller(dry_run).apply(&app)?,
                None => notice("dockerization canceled, nothing was written.")?,
            }
        }
        Opt::Center(command) => run_center(command)?,
    }

    Ok(())
}

fn run_center(command: CenterOpt) -> Result<()> {
    let common = match &command {
        CenterOpt::Install { common, .. }
        | CenterOpt::AddService { common, .. }
        | CenterOpt::AddDatabase { common, .. } => common,
    };

    let dir = resolve_directory(common.dir.clone())?;
    let dry_run = DryRun::new(common.dry_run);
    let daemon = DockerBackend::connect()?;
    let manager = CenterManager::new(&daemon, dry_run);

    let app = match &command {
        CenterOpt::Install { wildcard, common } => {
            let mut prompt = prompt(common.no_interaction);
            center::install(&dir, &manager, prompt.as_mut(), wildcard.as_deref())?
        }
        CenterOpt::AddService {
            slug,
            version,
            service,
            ..
        } => center::add_service(&dir, &manager, slug, version, &service.into())?,
        CenterOpt::AddDatabase {
            system,
            version,
            password,
            ..
        } => center::add_database(&dir, &manager, system, version, password.clone())?,
    };

    controller(dry_run).apply(&app)?;
    notice(&format!(
        "deploy with `docker stack deploy -c {} {}`.",
        COMPOSE_FILE,
        center::CENTER_NAME
    ))?;

    Ok(())
}

/// Absolute, so bind mounts of one-off runs resolve.
fn resolve_directory(dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match dir {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    dir.canonicalize()
        .map_err(|err| anyhow!("Couldn't open directory {:?}: {}", dir, err))
}

/// The dockerize flow only queries the daemon, so a missing one is not fatal.
fn connect() -> Box<dyn DaemonClient> {
    match DockerBackend::connect() {
        Ok(backend) => Box::new(backend),
        Err(err) => {
            warn!("continuing without docker: {}", err);
            Box::new(OfflineDaemon::new(err.to_string()))
        }
    }
}

fn prompt(no_interaction: bool) -> Box<dyn Prompt> {
    if no_interaction {
        Box::new(NonInteractive)
    } else {
        Box::new(ConsolePrompt::new(BufReader::new(io::stdin()), stdout()))
    }
}

fn controller(dry_run: DryRun) -> Controller {
    Controller::init(ShellRunner, stdout(), dry_run)
}

fn notice(message: &str) -> Result<()> {
    stdout()
        .queue(style::PrintStyledContent("INFO: ".cyan().bold()))?
        .queue(style::Print(format!("{}\n", message)))?
        .flush()?;

    Ok(())
}
