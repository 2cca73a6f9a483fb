use crate::media::FetchError;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] echo_decode::DecodeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Graph(#[from] echo_engine::GraphError),

    #[error(transparent)]
    Render(#[from] echo_render::RenderError),

    #[error(transparent)]
    Encode(#[from] echo_encode::EncodeError),

    #[error(transparent)]
    Catalog(#[from] echo_project::CatalogError),

    #[error("a track change is already in progress")]
    ChangeInFlight,

    #[error("no track at playlist index {0}")]
    NoSuchTrack(usize),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
