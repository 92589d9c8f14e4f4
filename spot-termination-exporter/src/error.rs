use failure::Fail;

#[derive(Debug, Fail)]
pub enum ExporterError {
    #[fail(display = "failed to load config file because {}", _0)]
    FailedConfig(String),
    #[fail(display = "invalid configuration: {}", _0)]
    InvalidConfig(String),
    #[fail(display = "failed to register collector because {}", _0)]
    FailedRegistration(String),
    #[fail(display = "failed to encode metrics because {}", _0)]
    FailedEncoding(String),
}
