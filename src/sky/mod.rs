//! Sky geometry used around the combination core: HEALPix RING pixels, the gnomonic
//! projection centred on a pixel, and the buffered pixel footprint.
pub mod footprint;
pub mod healpix;
pub mod tangent_plane;
