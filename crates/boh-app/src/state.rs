// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppMode, TabKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub active_tab: TabKind,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            active_tab: TabKind::Dashboard,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    NextTab,
    PrevTab,
    SelectTab(TabKind),
    EnterSearch,
    ExitToNav,
    OpenTagEditor,
    OpenPriceEditor,
    OpenDetail,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    TabChanged(TabKind),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::NextTab => self.rotate_tab(1),
            AppCommand::PrevTab => self.rotate_tab(-1),
            AppCommand::SelectTab(tab) => {
                if self.active_tab == tab {
                    return Vec::new();
                }
                self.active_tab = tab;
                self.mode = AppMode::Nav;
                vec![AppEvent::TabChanged(tab)]
            }
            AppCommand::EnterSearch => self.enter_row_mode(AppMode::Search),
            AppCommand::ExitToNav => {
                if self.mode == AppMode::Nav {
                    return Vec::new();
                }
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenTagEditor => self.enter_row_mode(AppMode::TagEditor),
            AppCommand::OpenPriceEditor => self.enter_row_mode(AppMode::PriceEdit),
            AppCommand::OpenDetail => {
                self.mode = AppMode::Detail;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    /// Modes that edit or filter rows exist only where rows are listed.
    fn enter_row_mode(&mut self, mode: AppMode) -> Vec<AppEvent> {
        if self.active_tab.is_placeholder() {
            return vec![self.set_status(&format!("{} is coming soon", self.active_tab.label()))];
        }
        if mode != AppMode::Search && self.active_tab != TabKind::Ingredients {
            return vec![self.set_status("switch to ingredients to edit")];
        }
        self.mode = mode;
        vec![AppEvent::ModeChanged(mode)]
    }

    fn rotate_tab(&mut self, delta: isize) -> Vec<AppEvent> {
        let tabs = TabKind::ALL;
        let current = tabs
            .iter()
            .position(|tab| *tab == self.active_tab)
            .unwrap_or(0) as isize;
        let len = tabs.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.active_tab = tabs[next];
        self.mode = AppMode::Nav;
        vec![AppEvent::TabChanged(self.active_tab)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState};
    use crate::{AppMode, TabKind};

    #[test]
    fn tab_rotation_wraps() {
        let mut state = AppState {
            active_tab: TabKind::Stocktake,
            ..AppState::default()
        };

        let events = state.dispatch(AppCommand::NextTab);
        assert_eq!(state.active_tab, TabKind::Dashboard);
        assert_eq!(events, vec![AppEvent::TabChanged(TabKind::Dashboard)]);

        state.dispatch(AppCommand::PrevTab);
        assert_eq!(state.active_tab, TabKind::Stocktake);
    }

    #[test]
    fn editors_only_open_on_ingredients() {
        let mut state = AppState::default();

        let events = state.dispatch(AppCommand::OpenTagEditor);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(
            events,
            vec![AppEvent::StatusUpdated(
                "switch to ingredients to edit".to_owned()
            )],
        );

        state.dispatch(AppCommand::SelectTab(TabKind::Ingredients));
        state.dispatch(AppCommand::OpenPriceEditor);
        assert_eq!(state.mode, AppMode::PriceEdit);
    }

    #[test]
    fn placeholder_tabs_refuse_row_modes() {
        let mut state = AppState {
            active_tab: TabKind::Menus,
            ..AppState::default()
        };

        state.dispatch(AppCommand::EnterSearch);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(state.status_line.as_deref(), Some("menus is coming soon"));
    }

    #[test]
    fn mode_transitions() {
        let mut state = AppState {
            active_tab: TabKind::Ingredients,
            ..AppState::default()
        };

        state.dispatch(AppCommand::EnterSearch);
        assert_eq!(state.mode, AppMode::Search);

        state.dispatch(AppCommand::OpenDetail);
        assert_eq!(state.mode, AppMode::Detail);

        let events = state.dispatch(AppCommand::ExitToNav);
        assert_eq!(events, vec![AppEvent::ModeChanged(AppMode::Nav)]);
        assert!(state.dispatch(AppCommand::ExitToNav).is_empty());
    }

    #[test]
    fn tab_change_resets_mode() {
        let mut state = AppState {
            active_tab: TabKind::Ingredients,
            mode: AppMode::Search,
            ..AppState::default()
        };
        state.dispatch(AppCommand::NextTab);
        assert_eq!(state.mode, AppMode::Nav);
    }

    #[test]
    fn status_set_and_clear() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::SetStatus("tags saved".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("tags saved"));
        assert_eq!(
            state.dispatch(AppCommand::ClearStatus),
            vec![AppEvent::StatusCleared]
        );
        assert_eq!(state.status_line, None);
    }
}
