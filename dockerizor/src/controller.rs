use crossterm::{
    style::{self, Colorize, Styler},
    QueueableCommand,
};
use log::{debug, info};
use std::{
    fmt::Display,
    fs::{self, DirBuilder},
    io::Write,
    path::Path,
};

use crate::{
    context::{AppBuildContext, GeneratedFile},
    error::Result,
    services::CommandRunner,
};

/// The one place that decides whether side effects happen.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DryRun(bool);

impl DryRun {
    pub fn new(enabled: bool) -> DryRun {
        DryRun(enabled)
    }

    pub fn enabled() -> DryRun {
        DryRun(true)
    }

    pub fn is_enabled(self) -> bool {
        self.0
    }

    /// True when `action` may be performed; logs and returns false under
    /// dry-run.
    pub fn permits<D: Display>(self, action: D) -> bool {
        if self.0 {
            info!("dry-run, skipping: {}", action);
            false
        } else {
            true
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FileOutcome {
    Written,
    Unchanged,
    Skipped,
}

/// Writes an application's files and runs its builds and commands.
pub struct Controller {
    runner: Box<dyn CommandRunner>,
    out: Box<dyn Write>,
    dry_run: DryRun,
}

impl Controller {
    pub fn init<R, W>(runner: R, out: W, dry_run: DryRun) -> Controller
    where
        R: 'static + CommandRunner,
        W: 'static + Write,
    {
        Controller {
            runner: Box::new(runner),
            out: Box::new(out),
            dry_run,
        }
    }

    pub fn dry_run(&self) -> DryRun {
        self.dry_run
    }

    /// Materialize then execute. The first failure stops the pipeline;
    /// files already written stay on disk.
    pub fn apply(&mut self, app: &AppBuildContext) -> Result<()> {
        self.materialize(app)?;
        self.execute(app)
    }

    pub fn materialize(&mut self, app: &AppBuildContext) -> Result<()> {
        let files = app.rendered_files()?;
        info!("materializing {} files for {:?}", files.len(), app.app_name);

        self.write_files(app.workdir(), &files)?;
        Ok(())
    }

    /// `docker build` for every context with a placed Dockerfile, then the
    /// registered runs.
    pub fn execute(&mut self, app: &AppBuildContext) -> Result<()> {
        let workdir = app.workdir();

        let builds = app
            .build_contexts()
            .iter()
            .filter_map(|context| {
                let dockerfile = context.dockerfile()?;
                let path = dockerfile.path.as_ref()?;
                let image = context.image()?;

                Some(format!(
                    "docker build -f {} -t {} .",
                    workdir.join(path).display(),
                    image
                ))
            })
            .collect::<Vec<_>>();

        for command in builds.iter() {
            self.run(command, workdir)?;
        }

        for run in app.runs() {
            self.run(&run.to_string(), workdir)?;
        }

        Ok(())
    }

    pub fn write_files(&mut self, workdir: &Path, files: &[GeneratedFile]) -> Result<Vec<FileOutcome>> {
        files
            .iter()
            .map(|file| self.write_file(workdir, file))
            .collect()
    }

    pub fn write_file(&mut self, workdir: &Path, file: &GeneratedFile) -> Result<FileOutcome> {
        let path = workdir.join(&file.path);

        if is_unchanged(&path, &file.contents) {
            debug!("{:?} is up to date", path);
            self.status("Unchanged", &file.path.display())?;
            return Ok(FileOutcome::Unchanged);
        }

        self.status("Creating", &path.display())?;

        if !self.dry_run.permits(format_args!("write {}", path.display())) {
            self.outcome(false)?;
            return Ok(FileOutcome::Skipped);
        }

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        fs::write(&path, &file.contents)?;
        self.outcome(true)?;

        Ok(FileOutcome::Written)
    }

    pub fn run(&mut self, command: &str, workdir: &Path) -> Result<()> {
        self.status("Executing", &command)?;

        if !self.dry_run.permits(command) {
            return self.outcome(false);
        }

        self.runner.run(command, workdir)?;
        self.outcome(true)
    }

    fn status(&mut self, verb: &str, subject: &dyn Display) -> Result<()> {
        self.out
            .queue(style::PrintStyledContent(format!("{} ", verb).cyan().bold()))?
            .queue(style::Print(format!("{}...\n", subject)))?
            .flush()?;
        Ok(())
    }

    fn outcome(&mut self, performed: bool) -> Result<()> {
        if performed {
            self.out
                .queue(style::PrintStyledContent("done\n".green().bold()))?;
        } else {
            self.out
                .queue(style::PrintStyledContent("skipped (dry-run)\n".yellow().bold()))?;
        }
        self.out.flush()?;
        Ok(())
    }
}

fn is_unchanged(path: &Path, contents: &str) -> bool {
    match fs::read(path) {
        Ok(existing) => blake3::hash(&existing) == blake3::hash(contents.as_bytes()),
        Err(_) => false,
    }
}

fn create_dir_all(path: &Path) -> Result<()> {
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(path)?;
    Ok(())
}
