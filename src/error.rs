use crate::{
    events::EventsError, pointings::PointingsError, profile::ProfileError, psf::PsfError,
    skymap::SkyMapError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `psf` module")]
    Psf(#[from] PsfError),
    #[error("Error in the `skymap` module")]
    SkyMap(#[from] SkyMapError),
    #[error("Error in the `pointings` module")]
    Pointings(#[from] PointingsError),
    #[error("Error in the `profile` module")]
    Profile(#[from] ProfileError),
    #[error("Error in the `events` module")]
    Events(#[from] EventsError),
}
