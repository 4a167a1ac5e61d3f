//! Trainable adapters over concrete models.

pub mod mlp;
