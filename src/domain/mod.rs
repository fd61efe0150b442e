pub mod artwork;
pub mod hash;
pub mod track;
