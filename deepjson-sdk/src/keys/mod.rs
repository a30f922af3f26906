//! Key-value verbs of [`DeepJsonClient`](crate::DeepJsonClient).

mod verbs;
