#![doc(html_root_url = "https://docs.rs/fragment-render/0.0.3")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Selector-targeted fragment rendering over a layered arena DOM.
//!
//! Start with [`Fragments::builder`] and [`RenderOptions`].

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod collaborators;
pub mod config;
pub mod deriver;
pub mod dom;
pub mod error;
pub mod events;
pub mod fallback;
pub mod html;
#[cfg(feature = "html5ever")]
pub mod html5;
pub mod keep;
pub mod layer;
pub mod lifecycle;
pub mod load;
pub mod render;
pub mod resolve;
pub mod selector;
pub mod steps;
pub mod swap;

mod temp_set;

pub use config::FragmentConfig;
pub use dom::{Dom, NodeId};
pub use error::RenderError;
pub use layer::{LayerId, LayerMode, LayerQuery};
pub use render::{AbortScope, Focus, Fragments, FragmentsBuilder, RenderHandle, RenderOptions, RenderResult, Scroll};
pub use resolve::{QueryOptions, Target};
