pub const DEFAULT_NODE_VERSION: &str = "lts";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeBuildContext {
    pub version: String,
    pub image: String,
    /// Long running command of the node service, `yarn watch` and the like.
    pub command: Option<String>,
}

impl Default for NodeBuildContext {
    fn default() -> Self {
        NodeBuildContext::new(DEFAULT_NODE_VERSION)
    }
}

impl NodeBuildContext {
    pub fn new<S: Into<String>>(version: S) -> NodeBuildContext {
        let version = version.into();
        NodeBuildContext {
            image: format!("node:{}-alpine", version),
            version,
            command: None,
        }
    }
}
