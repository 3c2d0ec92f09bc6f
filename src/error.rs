use crate::sysfs::DeviceClass;
use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum Ev3Error {
    #[error("no {class} connected to port {port}")]
    DeviceNotFound { class: DeviceClass, port: String },

    #[error("failed to access attribute {attribute} of {device}: {source}")]
    Attribute {
        device: String,
        attribute: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected value {value:?} in attribute {attribute} of {device}")]
    Parse {
        device: String,
        attribute: String,
        value: String,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Ev3Error {
    /// True for errors caused by a missing or re-enumerated device.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Ev3Error::DeviceNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Ev3Error>;
