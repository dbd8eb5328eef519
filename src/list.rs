//! List coordinator
//!
//! Owns the browse screen state: popular videos, debounced search results
//! and the current selection. Runs as a task like the playback coordinator.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::DataError;
use crate::models::VideoItem;
use crate::repository::VideoRepository;

#[derive(Debug, Clone, PartialEq)]
pub struct ListConfig {
    /// Quiet period between the last keystroke and the search request
    pub search_debounce: Duration,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(300),
        }
    }
}

/// User intents on the browse screen
#[derive(Debug, Clone, PartialEq)]
pub enum ListAction {
    ChangedText(String),
    RefreshSwipe,
    VideoClicked(u64),
}

/// Browse screen state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListState {
    pub is_loading: bool,
    pub is_searching: bool,
    pub error_message: Option<String>,
    /// Failure behind `error_message`
    #[serde(skip)]
    pub error: Option<DataError>,
    pub top_videos: Vec<VideoItem>,
    pub search_results: Vec<VideoItem>,
    pub query: String,
    pub selected: Option<u64>,
}

impl ListState {
    /// Search results while a query is entered, popular videos otherwise
    pub fn visible(&self) -> &[VideoItem] {
        if self.query.trim().is_empty() {
            &self.top_videos
        } else {
            &self.search_results
        }
    }

    pub fn is_busy(&self) -> bool {
        self.is_loading || self.is_searching
    }

    fn set_error(&mut self, err: DataError) {
        self.error_message = Some(err.user_message());
        self.error = Some(err);
    }

    fn clear_error(&mut self) {
        self.error_message = None;
        self.error = None;
    }
}

enum Command {
    LoadPopular,
    Refresh,
    Action(ListAction),
    PopularLoaded {
        generation: u64,
        result: Result<Vec<VideoItem>, DataError>,
    },
    SearchFinished {
        generation: u64,
        result: Result<Vec<VideoItem>, DataError>,
    },
}

/// Handle to a running list coordinator
#[derive(Clone)]
pub struct ListCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ListState>,
}

impl ListCoordinator {
    /// Start a coordinator task; nothing is loaded until asked
    pub fn spawn(repository: Arc<dyn VideoRepository>, config: ListConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (publisher, state) = watch::channel(ListState::default());

        let actor = Actor {
            repository,
            config,
            state: ListState::default(),
            publisher,
            tx: tx.downgrade(),
            popular_generation: 0,
            search_generation: 0,
            popular_task: None,
            search_task: None,
        };
        tokio::spawn(actor.run(rx));

        Self { tx, state }
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            debug!("list coordinator is gone, command dropped");
        }
    }

    pub fn dispatch(&self, action: ListAction) {
        self.send(Command::Action(action));
    }

    /// Popular videos, cache first
    pub fn load_popular(&self) {
        self.send(Command::LoadPopular);
    }

    /// Popular videos from the network
    pub fn refresh(&self) {
        self.send(Command::Refresh);
    }

    pub fn search(&self, text: impl Into<String>) {
        self.dispatch(ListAction::ChangedText(text.into()));
    }

    pub fn refresh_swipe(&self) {
        self.dispatch(ListAction::RefreshSwipe);
    }

    pub fn select(&self, id: u64) {
        self.dispatch(ListAction::VideoClicked(id));
    }

    pub fn state(&self) -> ListState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.state.clone()
    }
}

struct Actor {
    repository: Arc<dyn VideoRepository>,
    config: ListConfig,
    state: ListState,
    publisher: watch::Sender<ListState>,
    tx: mpsc::WeakUnboundedSender<Command>,
    popular_generation: u64,
    search_generation: u64,
    popular_task: Option<JoinHandle<()>>,
    search_task: Option<JoinHandle<()>>,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
            let state = &self.state;
            self.publisher.send_if_modified(|published| {
                if published == state {
                    false
                } else {
                    *published = state.clone();
                    true
                }
            });
        }

        abort(&mut self.popular_task);
        abort(&mut self.search_task);
        debug!("list coordinator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::LoadPopular => self.load_popular(false),
            Command::Refresh => self.load_popular(true),
            Command::Action(ListAction::ChangedText(text)) => self.search(text),
            Command::Action(ListAction::RefreshSwipe) => {
                if self.state.query.trim().is_empty() {
                    self.load_popular(true);
                } else {
                    let query = self.state.query.clone();
                    self.search(query);
                }
            }
            Command::Action(ListAction::VideoClicked(id)) => {
                debug!(id, "video selected");
                self.state.selected = Some(id);
            }
            Command::PopularLoaded { generation, result } => {
                if generation != self.popular_generation {
                    return;
                }
                self.state.is_loading = false;
                match result {
                    Ok(videos) => {
                        info!(count = videos.len(), "popular videos loaded");
                        self.state.top_videos = videos;
                        self.state.clear_error();
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to load popular videos");
                        self.state.top_videos.clear();
                        self.state.set_error(e);
                    }
                }
            }
            Command::SearchFinished { generation, result } => {
                if generation != self.search_generation {
                    return;
                }
                self.state.is_searching = false;
                match result {
                    Ok(videos) => {
                        self.state.search_results = videos;
                        self.state.clear_error();
                    }
                    Err(e) => {
                        warn!(error = %e, "search failed");
                        self.state.search_results.clear();
                        self.state.set_error(e);
                    }
                }
            }
        }
    }

    fn load_popular(&mut self, from_network: bool) {
        self.popular_generation += 1;
        abort(&mut self.popular_task);
        self.state.is_loading = true;
        self.state.clear_error();

        let repository = self.repository.clone();
        let tx = self.tx.clone();
        let generation = self.popular_generation;
        self.popular_task = Some(tokio::spawn(async move {
            let result = if from_network {
                repository.refresh_popular().await
            } else {
                repository.popular_videos().await
            };
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::PopularLoaded { generation, result });
            }
        }));
    }

    fn search(&mut self, text: String) {
        self.search_generation += 1;
        abort(&mut self.search_task);
        self.state.query = text;

        let query = self.state.query.trim().to_string();
        if query.is_empty() {
            self.state.search_results.clear();
            self.state.is_searching = false;
            return;
        }

        self.state.is_searching = true;
        self.state.clear_error();

        let repository = self.repository.clone();
        let tx = self.tx.clone();
        let generation = self.search_generation;
        let debounce = self.config.search_debounce;
        self.search_task = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            debug!(%query, "searching");
            let result = repository.search(&query).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Command::SearchFinished { generation, result });
            }
        }));
    }
}

fn abort(task: &mut Option<JoinHandle<()>>) {
    if let Some(task) = task.take() {
        task.abort();
    }
}
