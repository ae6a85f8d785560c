//! State behind the `play` screen: one game, the session running it and the
//! results shown once it ends.

use std::rc::Rc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::{info, warn};

use crate::games::{self, GameKind, Key, Playable, ResultHook};
use crate::session::SessionOptions;
use crate::sound::{Silent, SoundSink};
use crate::stats::{SessionResult, StatsDb};

/// Results listed under the chart.
pub const RECENT_RESULTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Playing,
    Results,
}

pub type SoundFactory = fn() -> Box<dyn SoundSink>;

fn silent() -> Box<dyn SoundSink> {
    Box::new(Silent)
}

pub struct App {
    pub kind: GameKind,
    pub session: Box<dyn Playable>,
    pub state: AppState,
    /// Last clock reading handed to the session.
    pub now: u64,
    pub recent: Vec<SessionResult>,
    pub best: Option<u32>,
    pub options: SessionOptions,
    store: Option<Rc<StatsDb>>,
    sound: SoundFactory,
    should_quit: bool,
}

impl App {
    pub fn new(kind: GameKind, options: SessionOptions, store: Option<Rc<StatsDb>>) -> Self {
        Self::with_sound(kind, options, store, silent)
    }

    pub fn with_sound(
        kind: GameKind,
        options: SessionOptions,
        store: Option<Rc<StatsDb>>,
        sound: SoundFactory,
    ) -> Self {
        let session = build_session(kind, &options, store.as_ref(), sound);
        Self {
            kind,
            session,
            state: AppState::Playing,
            now: 0,
            recent: Vec::new(),
            best: None,
            options,
            store,
            sound,
            should_quit: false,
        }
    }

    pub fn start(&mut self, now: u64) {
        self.now = now;
        self.session.start(now);
    }

    /// A fresh session of the same game; the finished one is dropped.
    pub fn replay(&mut self, now: u64) {
        info!("replaying {}", self.kind);
        self.session = build_session(self.kind, &self.options, self.store.as_ref(), self.sound);
        self.state = AppState::Playing;
        self.start(now);
    }

    pub fn on_tick(&mut self, now: u64) {
        self.now = now;
        if self.state != AppState::Playing {
            return;
        }
        self.session.tick(now);
        if self.session.state().is_over() {
            self.show_results();
        }
    }

    pub fn on_key(&mut self, key: KeyEvent, now: u64) {
        self.now = now;
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.quit();
            return;
        }

        match self.state {
            AppState::Playing => self.on_play_key(key.code, now),
            AppState::Results => match key.code {
                KeyCode::Char('r') => self.replay(now),
                KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                _ => {}
            },
        }
    }

    fn on_play_key(&mut self, code: KeyCode, now: u64) {
        if code == KeyCode::Esc {
            self.session.toggle_pause(now);
            return;
        }

        if self.session.state().paused {
            match code {
                KeyCode::Char('r') => self.session.restart(now),
                KeyCode::Char('s') => {
                    self.options.sound_enabled = self.session.toggle_sound();
                }
                KeyCode::Char('q') => self.quit(),
                _ => {}
            }
            return;
        }

        if let Some(key) = game_key(code) {
            self.session.press(key, now);
            if self.session.state().is_over() {
                self.show_results();
            }
        }
    }

    fn show_results(&mut self) {
        self.state = AppState::Results;
        let Some(store) = &self.store else {
            return;
        };
        match store.recent(RECENT_RESULTS, Some(self.kind)) {
            Ok(recent) => self.recent = recent,
            Err(e) => warn!("could not read recent results: {e}"),
        }
        match store.best_score(self.kind) {
            Ok(best) => self.best = best,
            Err(e) => warn!("could not read best score: {e}"),
        }
    }

    /// Leave without recording an unfinished session.
    pub fn quit(&mut self) {
        if self.state == AppState::Playing {
            self.session.abandon();
        }
        self.should_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }
}

/// Keys forwarded to the running game.
pub fn game_key(code: KeyCode) -> Option<Key> {
    match code {
        KeyCode::Char(c) => Some(Key::Char(c.to_ascii_lowercase())),
        KeyCode::Left => Some(Key::Left),
        KeyCode::Right => Some(Key::Right),
        KeyCode::Up => Some(Key::Up),
        KeyCode::Down => Some(Key::Down),
        KeyCode::Enter => Some(Key::Enter),
        _ => None,
    }
}

fn build_session(
    kind: GameKind,
    options: &SessionOptions,
    store: Option<&Rc<StatsDb>>,
    sound: SoundFactory,
) -> Box<dyn Playable> {
    let hook = store.map(|store| {
        let store = Rc::clone(store);
        Box::new(move |result: SessionResult| {
            if let Err(e) = store.record(&result) {
                warn!("could not record {} result: {e}", result.game);
            }
        }) as ResultHook
    });
    games::build_with(kind, options.clone(), sound(), hook)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Phase;

    fn press(app: &mut App, code: KeyCode, now: u64) {
        app.on_key(KeyEvent::new(code, KeyModifiers::NONE), now);
    }

    fn quiet(seed: u64) -> SessionOptions {
        SessionOptions {
            sound_enabled: false,
            seed: Some(seed),
        }
    }

    #[test]
    fn esc_pauses_and_resumes_once_playing() {
        let mut app = App::new(GameKind::ColorMatch, quiet(1), None);
        app.start(0);
        app.on_tick(3_000);
        assert_eq!(app.session.state().phase, Phase::Playing);

        press(&mut app, KeyCode::Esc, 3_100);
        assert!(app.session.state().paused);
        press(&mut app, KeyCode::Esc, 3_200);
        assert!(!app.session.state().paused);
    }

    #[test]
    fn sound_toggle_only_from_the_pause_menu() {
        let mut app = App::new(GameKind::ColorMatch, quiet(1), None);
        app.start(0);
        app.on_tick(3_000);

        press(&mut app, KeyCode::Char('s'), 3_050);
        assert!(!app.options.sound_enabled);

        press(&mut app, KeyCode::Esc, 3_100);
        press(&mut app, KeyCode::Char('s'), 3_150);
        assert!(app.options.sound_enabled);
        assert!(app.session.state().sound_enabled);
    }

    #[test]
    fn ctrl_c_quits_without_results() {
        let mut app = App::new(GameKind::Flanker, quiet(2), None);
        app.start(0);
        app.on_key(
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            500,
        );
        assert!(app.should_quit());
        assert_eq!(app.state, AppState::Playing);
    }

    #[test]
    fn finished_session_is_recorded_and_listed() {
        let store = Rc::new(StatsDb::in_memory().unwrap());
        let mut app = App::new(GameKind::SequenceRecall, quiet(4), Some(Rc::clone(&store)));
        app.start(0);

        // Nobody clicks: every sequence times out until the lives run out.
        let mut now = 0;
        while app.state == AppState::Playing && now < 600_000 {
            now += 50;
            app.on_tick(now);
        }

        assert_eq!(app.state, AppState::Results);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(app.recent.len(), 1);
        assert_eq!(app.best, Some(0));

        press(&mut app, KeyCode::Char('r'), now + 10);
        assert_eq!(app.state, AppState::Playing);
        assert_eq!(app.session.state().phase, Phase::Countdown);
    }

    #[test]
    fn uppercase_keys_reach_games_lowercased() {
        assert_eq!(game_key(KeyCode::Char('Y')), Some(Key::Char('y')));
        assert_eq!(game_key(KeyCode::Tab), None);
    }
}
