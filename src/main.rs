// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Mangavox - comic page translation and narration
//!
//! A cross-platform desktop application for reviewing OCR results on comic
//! pages, editing their translations and narrating them with synthesized
//! speech.

mod app;
mod canvas;
mod config;
mod io;
mod models;
mod narration;
mod services;
mod ui;
mod util;

use anyhow::Result;
use app::MangavoxApp;
use config::AppConfig;

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let config_path = AppConfig::default_path();
    let config = match AppConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Ignoring configuration {}: {:#}", config_path.display(), e);
            AppConfig::default()
        }
    };

    // Configure egui options
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([800.0, 600.0])
            .with_title("Mangavox"),
        ..Default::default()
    };

    // Run the application
    eframe::run_native(
        "Mangavox",
        options,
        Box::new(|_cc| Ok(Box::new(MangavoxApp::new(config)))),
    )
    .map_err(|e| anyhow::anyhow!("Application error: {}", e))?;

    Ok(())
}
