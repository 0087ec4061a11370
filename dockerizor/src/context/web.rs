/// The nginx tier serving the application's public directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebBuildContext {
    pub root_directory: String,
    /// Host port published when no proxy routes to the service.
    pub port: u16,
}

impl Default for WebBuildContext {
    fn default() -> Self {
        WebBuildContext {
            root_directory: "/var/www/html".to_string(),
            port: 80,
        }
    }
}

impl WebBuildContext {
    pub fn new<S: Into<String>>(root_directory: S, port: u16) -> WebBuildContext {
        WebBuildContext {
            root_directory: root_directory.into(),
            port,
        }
    }
}
