//! # Session entry points
//!
//! `import` turns a streaming-history export into a new encrypted store.
//! `run` unlocks the store, shows the statistics, fills in missing metadata in
//! the background while redrawing on every change, and writes the store back
//! once when the session ends.

use crate::api_client::LastFmClient;
use crate::configuration::{confirm, get_configuration, ConfigFolder, Settings};
use crate::enrichment::{
    artist_card_tasks, initial_tasks, Enricher, EnrichmentQueue, ImageLibrary, QueueSettings,
};
use crate::foundation::store::{DocumentHandle, StatisticsDocument, StoreError, StoreFile, UnlockedStore};
use crate::foundation::utils::read_passphrase;
use crate::presentation::{genres_line, render_artist_page, render_dashboard};
use crate::process;
use crate::ranking::{artist_page, page_artists, page_count, ARTISTS_PER_PAGE};
use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::{env, fs};
use tracing::{info, warn};

/// Read instead of prompting when set.
pub const PASSPHRASE_ENV: &str = "FUNNYTUNES_PASSPHRASE";

const MAX_UNLOCK_ATTEMPTS: usize = 3;

pub fn import(cfg_folder: &ConfigFolder, export_path: &Path) -> anyhow::Result<()> {
    let settings = load_settings(cfg_folder)?;
    let store = StoreFile::new(&cfg_folder.store_file);

    if store.exists() && !confirm("A listening database already exists. Replace it?")? {
        println!("\x1b[33mOperation cancelled.\x1b[0m");
        return Ok(());
    }

    println!("\x1b[1m\x1b[34mReading streaming history...\x1b[0m");
    let doc = process::import_export(export_path)
        .with_context(|| format!("could not import {}", export_path.display()))?;
    let tracks: usize = doc.artists.values().map(|a| a.tracks.len()).sum();
    println!(
        "\x1b[32mFound {} artists and {} tracks.\x1b[0m",
        doc.artists.len(),
        tracks
    );

    let passphrase = new_passphrase()?;
    fs::create_dir_all(&cfg_folder.config_dir)?;
    store.create(&passphrase, &doc, settings.store.kdf_iterations)?;

    println!(
        "\x1b[32mEncrypted listening database written to {}\x1b[0m",
        store.path().display()
    );
    Ok(())
}

pub async fn run(cfg_folder: &ConfigFolder, page: Option<usize>, offline: bool) -> anyhow::Result<()> {
    let store = StoreFile::new(&cfg_folder.store_file);
    if !store.exists() {
        eprintln!(
            "\x1b[1m\x1b[31mNo listening database found. Run 'funnytunes import <export>' first.\x1b[0m"
        );
        return Ok(());
    }

    let settings = load_settings(cfg_folder)?;
    let (passphrase, mut unlocked, doc) = unlock_with_retry(&store)?;
    let upgraded = unlocked.upgrade(&passphrase, settings.store.kdf_iterations)?;
    if upgraded {
        info!("Store will be re-encrypted with a random salt");
    }

    let library = ImageLibrary::new(&cfg_folder.images_dir);
    let handle = DocumentHandle::new(doc);

    let enrich = !offline && !settings.api.api_key.is_empty();
    if !offline && !enrich {
        println!("\x1b[33mNo Last.fm API key configured; skipping enrichment.\x1b[0m");
    }
    if enrich {
        enrich_session(&settings, &handle, &library, page).await?;
    }

    let doc = handle.snapshot();
    println!("{}", render_dashboard(&doc, &library));
    if let Some(page) = page {
        let pages = page_count(&doc, ARTISTS_PER_PAGE);
        let cards = artist_page(&doc, &library, page, ARTISTS_PER_PAGE);
        println!("{}", render_artist_page(&cards, page, pages));
    }

    if enrich || upgraded {
        save_session(&unlocked, &doc)?;
    }
    Ok(())
}

/// Runs the enrichment queue until it drains or the user interrupts, showing
/// progress and the live genre list.
async fn enrich_session(
    settings: &Settings,
    handle: &DocumentHandle,
    library: &ImageLibrary,
    page: Option<usize>,
) -> anyhow::Result<()> {
    let client = Arc::new(LastFmClient::new(&settings.api)?);
    fs::create_dir_all(library.root())?;
    let enricher = Arc::new(Enricher::new(
        handle.clone(),
        client.clone(),
        client,
        library.clone(),
    ));

    let queue = EnrichmentQueue::new(QueueSettings::from(&settings.enrichment));

    let tasks = handle.read(|doc| {
        let mut tasks = initial_tasks(doc, settings.enrichment.artists, settings.enrichment.tracks);
        if let Some(page) = page {
            for artist in page_artists(doc, page, ARTISTS_PER_PAGE) {
                tasks.extend(artist_card_tasks(&artist));
            }
        }
        tasks
    });
    for task in tasks {
        queue.enqueue(task);
    }

    let worker = queue.spawn(enricher);
    let progress = ProgressBar::new(queue.status().total() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{elapsed_precise} [{bar:40.cyan/blue}] {pos}/{len} lookups {msg}")?
            .progress_chars("##-"),
    );
    progress.set_message(handle.read(genres_line));

    let mut doc_changes = handle.subscribe();
    let mut status_changes = queue.subscribe();
    let idle = queue.wait_idle();
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(idle, interrupted);

    loop {
        tokio::select! {
            _ = &mut idle => break,
            _ = &mut interrupted => {
                warn!("Interrupted, abandoning remaining lookups");
                break;
            }
            Ok(()) = doc_changes.changed() => {
                doc_changes.borrow_and_update();
                progress.set_message(handle.read(genres_line));
            }
            Ok(()) = status_changes.changed() => {
                let status = *status_changes.borrow_and_update();
                progress.set_length(status.total() as u64);
                progress.set_position((status.completed + status.failed) as u64);
            }
        }
    }

    worker.abort();
    let status = queue.status();
    progress.finish_with_message(format!(
        "{} lookups done, {} failed",
        status.completed, status.failed
    ));
    Ok(())
}

fn save_session(unlocked: &UnlockedStore, doc: &StatisticsDocument) -> anyhow::Result<()> {
    unlocked
        .persist(doc)
        .context("could not save the listening database")?;
    println!("\x1b[32mListening database saved.\x1b[0m");
    Ok(())
}

fn load_settings(cfg_folder: &ConfigFolder) -> anyhow::Result<Settings> {
    get_configuration(&cfg_folder.config_file).context("unable to parse configuration file")
}

/// Prompts for the passphrase until the store opens, up to
/// [`MAX_UNLOCK_ATTEMPTS`] times. A passphrase from the environment gets a
/// single attempt.
fn unlock_with_retry(
    store: &StoreFile,
) -> anyhow::Result<(String, UnlockedStore, StatisticsDocument)> {
    let from_env = env::var(PASSPHRASE_ENV).ok();
    let attempts = if from_env.is_some() { 1 } else { MAX_UNLOCK_ATTEMPTS };

    for _ in 0..attempts {
        let passphrase = match &from_env {
            Some(p) => p.clone(),
            None => read_passphrase("Enter your password:")?,
        };

        match store.unlock(&passphrase) {
            Ok((unlocked, doc)) => return Ok((passphrase, unlocked, doc)),
            Err(StoreError::Authentication) => {
                eprintln!("\x1b[31mIncorrect password\x1b[0m");
            }
            Err(e) => return Err(e).context("could not open the listening database"),
        }
    }

    bail!("could not unlock the listening database")
}

fn new_passphrase() -> anyhow::Result<String> {
    if let Ok(passphrase) = env::var(PASSPHRASE_ENV) {
        return Ok(passphrase);
    }

    let passphrase = read_passphrase("Choose a password to encrypt your listening data:")?;
    if passphrase.is_empty() {
        bail!("the password must not be empty");
    }
    if read_passphrase("Repeat the password:")? != passphrase {
        bail!("the passwords do not match");
    }
    Ok(passphrase)
}
