use settle_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("api server: {0}")]
    Api(#[from] settle_api_server::ApiError),

    #[error("api task: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
}
