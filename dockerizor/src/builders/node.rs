use crate::{
    center::LABEL_ENABLE,
    compose::{Service, ServiceVolume},
    context::{AppBuildContext, NodeBuildContext},
};

pub const SERVICE_NAME: &str = "node";

pub fn build(app: &mut AppBuildContext, context: &mut NodeBuildContext) -> Service {
    let mut service = Service::new(SERVICE_NAME).with_image(context.image.clone());
    service
        .add_label(LABEL_ENABLE, "true")
        .add_volume(ServiceVolume::new(".", "/app"));
    service.working_dir = Some("/app".to_string());

    if let Some(command) = &context.command {
        service.set_command_line(command);
    }

    app.compose_file_mut().add_service(service.clone());
    service
}
