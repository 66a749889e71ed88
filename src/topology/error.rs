#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TopologyError {
    #[error("Node name already in use: {0}")]
    DuplicateName(String),
    #[error("Link references unknown node: {0}")]
    UnknownNode(String),
    #[error("Node {0} can not be linked to itself")]
    SelfLink(String),
    #[error("Switch {0} can not carry an address")]
    AddressOnSwitch(String),
    #[error("Interface name {0} is longer than 15 characters")]
    InterfaceNameTooLong(String),
    #[error("No host named {0}")]
    UnknownHost(String),
    #[error("Host {host} has no address on interface {index}")]
    MissingAddress { host: String, index: usize },
    #[error("Host {host} has no interface {index}")]
    MissingInterface { host: String, index: usize },
}
