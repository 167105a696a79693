use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::time::Duration;

use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    None,
}

/// Posição consolidada de um frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollSnapshot {
    pub y: f64,
    pub delta: f64,
    pub direction: ScrollDirection,
    /// px/ms desde o último frame emitido.
    pub velocity: f64,
}

#[derive(Debug, Default)]
struct ScrollState {
    /// Última posição recebida e quando.
    latest: Option<(f64, u64)>,
    /// Primeira posição recebida; base do primeiro frame.
    origin: Option<(f64, u64)>,
    /// Último frame emitido.
    emitted: Option<(f64, u64)>,
    dirty: bool,
    events: u64,
    frames: u64,
}

/// Junta eventos de scroll em no máximo um snapshot por frame.
#[derive(Clone)]
pub struct ScrollOptimizer {
    throttle_ms: u64,
    state: Arc<Mutex<ScrollState>>,
}

impl ScrollOptimizer {
    pub fn new(throttle: Duration) -> Self {
        Self {
            throttle_ms: throttle.as_millis() as u64,
            state: Arc::new(Mutex::new(ScrollState::default())),
        }
    }

    pub fn on_scroll(&self, y: f64, now_ms: u64) {
        let mut state = lock(&self.state);
        state.latest = Some((y, now_ms));
        state.origin.get_or_insert((y, now_ms));
        state.dirty = true;
        state.events += 1;
    }

    /// Chamado a cada animation frame. Retorna o snapshot se houve scroll
    /// desde o último frame e o throttle já passou.
    pub fn flush_frame(&self, now_ms: u64) -> Option<ScrollSnapshot> {
        let mut state = lock(&self.state);
        if !state.dirty {
            return None;
        }
        let (y, _) = state.latest?;

        let (prev_y, prev_at) = match state.emitted {
            Some((prev_y, prev_at)) => {
                if now_ms.saturating_sub(prev_at) < self.throttle_ms {
                    return None;
                }
                (prev_y, prev_at)
            }
            None => state.origin.unwrap_or((y, now_ms)),
        };

        let delta = y - prev_y;
        let elapsed = now_ms.saturating_sub(prev_at);
        let velocity = if elapsed == 0 { 0.0 } else { delta.abs() / elapsed as f64 };
        let direction = if delta > 0.0 {
            ScrollDirection::Down
        } else if delta < 0.0 {
            ScrollDirection::Up
        } else {
            ScrollDirection::None
        };

        state.emitted = Some((y, now_ms));
        state.dirty = false;
        state.frames += 1;
        Some(ScrollSnapshot {
            y,
            delta,
            direction,
            velocity,
        })
    }

    /// (eventos recebidos, frames emitidos)
    pub fn counts(&self) -> (u64, u64) {
        let state = lock(&self.state);
        (state.events, state.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimizer() -> ScrollOptimizer {
        ScrollOptimizer::new(Duration::from_millis(16))
    }

    #[test]
    fn coalesces_events_into_one_frame() {
        let scroll = optimizer();
        assert_eq!(scroll.flush_frame(0), None);

        scroll.on_scroll(10.0, 1);
        scroll.on_scroll(20.0, 2);
        scroll.on_scroll(30.0, 3);
        let first = scroll.flush_frame(4).unwrap();
        assert_eq!(first.y, 30.0);
        // Base é o primeiro evento coalescido
        assert_eq!(first.delta, 20.0);
        assert_eq!(first.direction, ScrollDirection::Down);
        assert!((first.velocity - 20.0 / 3.0).abs() < 1e-9);

        // Nada novo: sem frame
        assert_eq!(scroll.flush_frame(40), None);
        assert_eq!(scroll.counts(), (3, 1));
    }

    #[test]
    fn throttle_skips_early_frames() {
        let scroll = optimizer();
        scroll.on_scroll(0.0, 0);
        scroll.flush_frame(0).unwrap();

        scroll.on_scroll(100.0, 5);
        assert_eq!(scroll.flush_frame(10), None);

        // Posição continua pendente para o próximo frame
        let snap = scroll.flush_frame(20).unwrap();
        assert_eq!(snap.delta, 100.0);
        assert_eq!(snap.direction, ScrollDirection::Down);
        assert!((snap.velocity - 5.0).abs() < 1e-9);
    }

    #[test]
    fn single_event_first_frame_is_still() {
        let scroll = optimizer();
        scroll.on_scroll(250.0, 7);
        let snap = scroll.flush_frame(8).unwrap();
        assert_eq!(snap.delta, 0.0);
        assert_eq!(snap.direction, ScrollDirection::None);
    }

    #[test]
    fn scrolling_up() {
        let scroll = optimizer();
        scroll.on_scroll(500.0, 0);
        scroll.flush_frame(0);
        scroll.on_scroll(420.0, 30);
        let snap = scroll.flush_frame(32).unwrap();
        assert_eq!(snap.direction, ScrollDirection::Up);
        assert_eq!(snap.delta, -80.0);
    }
}
