use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("loader error: {0}")]
    Loader(#[from] mc_loader::LoaderError),
    #[error("incomplete reference triplet for id {0}")]
    IncompleteTriplet(u64),
}

pub type Result<T> = std::result::Result<T, VerifyError>;
