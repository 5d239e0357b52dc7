//! Wire formats of the supported APIs.

pub mod openai;
