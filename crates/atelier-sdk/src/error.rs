use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("board error: {0}")]
    Board(#[from] atelier_boards::BoardError),

    #[error("store error: {0}")]
    Store(#[from] atelier_store::StoreError),

    #[error("settings error: {0}")]
    Settings(#[from] atelier_settings::SettingsError),

    #[error("image data error: {0}")]
    Image(#[from] atelier_types::TypeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GalleryResult<T> = Result<T, GalleryError>;
