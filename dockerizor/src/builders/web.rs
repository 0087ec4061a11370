use crate::{
    center::LABEL_ENABLE,
    compose::{Port, Service, ServiceVolume},
    context::{AppBuildContext, GeneratedFile, WebBuildContext},
};

pub const SERVICE_NAME: &str = "web";
const IMAGE: &str = "nginx:alpine";
const NGINX_CONF: &str = "docker/nginx/default.conf";
const NGINX_CONF_TARGET: &str = "/etc/nginx/conf.d/default.conf";

const NGINX_TEMPLATE: &str = r#"server {
    listen 80 default_server;
    listen [::]:80 default_server;

    server_name localhost;

    root {{root_directory}};
    index index.php index.html;

    location / {
        try_files $uri $uri/ /index.php$is_args$args;
    }

    location ~* \.php$ {
        fastcgi_pass {{php_fpm}}:9000;
        include fastcgi_params;
        fastcgi_param SCRIPT_FILENAME $document_root$fastcgi_script_name;
        fastcgi_param SCRIPT_NAME $fastcgi_script_name;
    }
}
"#;

/// nginx in front of php-fpm. Behind the proxy the service is routed by
/// host name, otherwise `context.port` is published on the host.
pub fn build(app: &mut AppBuildContext, context: &mut WebBuildContext) -> Service {
    let app_name = app.app_name.clone();

    let mut service = Service::new(SERVICE_NAME).with_image(IMAGE);
    service
        .add_label(LABEL_ENABLE, "true")
        .add_volume(ServiceVolume::new(".", "/var/www/html"));

    match (app.proxy(), app.frontend_network()) {
        (Some(_), Some(network)) => {
            let domain = app
                .domain
                .clone()
                .unwrap_or_else(|| format!("{}.localhost", app_name));

            service
                .add_deploy_label("traefik.enable", "true")
                .add_deploy_label(
                    format!("traefik.http.routers.{}-web.rule", app_name),
                    format!("Host(`{}`)", domain),
                )
                .add_deploy_label(format!("traefik.http.routers.{}-web.entrypoints", app_name), "http")
                .add_deploy_label(
                    format!("traefik.http.services.{}.loadbalancer.server.port", app_name),
                    "80",
                )
                .add_network(network, Some(&format!("{}-web", app_name)));
        }
        _ => {
            service.add_port(Port::new(context.port, 80));
        }
    }

    service.add_volume(ServiceVolume::new(format!("./{}", NGINX_CONF), NGINX_CONF_TARGET));
    app.add_file(GeneratedFile::new(NGINX_CONF, nginx_config(&app_name, context)));
    app.compose_file_mut().add_service(service.clone());

    service
}

fn nginx_config(app_name: &str, context: &WebBuildContext) -> String {
    NGINX_TEMPLATE
        .replace("{{root_directory}}", &context.root_directory)
        .replace("{{php_fpm}}", &format!("{}-php", app_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backends::memory::container,
        compose::ComposeFile,
    };

    #[test]
    fn standalone_publishes_the_port() {
        let mut app = AppBuildContext::new("shop", "/srv/shop", ComposeFile::new());
        let mut context = WebBuildContext::new("/var/www/html/public", 8001);

        let service = build(&mut app, &mut context);

        assert_eq!(service.ports, [Port::new(8001, 80)]);
        assert!(service.deploy.is_none());
        assert!(service.networks.is_empty());

        let conf = &app.files()[0];
        assert!(conf.contents.contains("root /var/www/html/public;"));
        assert!(conf.contents.contains("fastcgi_pass shop-php:9000;"));
    }

    #[test]
    fn proxied_service_is_routed_by_host() {
        let mut app = AppBuildContext::new("shop", "/srv/shop", ComposeFile::new());
        app.domain = Some("shop.apps.test".into());
        app.set_frontend_network("dockerizor-frontend")
            .set_proxy(container("center_traefik.1", "traefik:2.9", &["dockerizor-frontend"], &[80]));

        let service = build(&mut app, &mut WebBuildContext::default());

        assert!(service.ports.is_empty());
        let labels = &service.deploy.as_ref().unwrap().labels;
        assert_eq!(labels["traefik.http.routers.shop-web.rule"], "Host(`shop.apps.test`)");
        assert_eq!(labels["traefik.http.services.shop.loadbalancer.server.port"], "80");
        assert_eq!(service.networks["dockerizor-frontend"].aliases, ["shop-web"]);
    }
}
