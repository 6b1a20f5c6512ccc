pub mod action_buttons;
pub mod analysis_results;
pub mod city_gallery;
pub mod error_banner;
pub mod header;
pub mod progress_bar;
pub mod upload_area;
