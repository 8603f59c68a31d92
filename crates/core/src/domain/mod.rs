pub mod activity;
pub mod catalog;
pub mod line_item;
pub mod quotation;
pub mod read_model;
pub mod settings;
