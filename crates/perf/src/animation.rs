use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Duration;
use tracing::debug;

use crate::capability::{Capabilities, DeviceProfile};

/// Faixa de capacidade do dispositivo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceTier {
    Low,
    Medium,
    High,
}

impl PerformanceTier {
    pub fn detect(device: &DeviceProfile) -> Self {
        if device.cpu_cores <= 2 || device.memory_gb < 2.0 || device.save_data {
            PerformanceTier::Low
        } else if device.cpu_cores >= 8 && device.memory_gb >= 8.0 {
            PerformanceTier::High
        } else {
            PerformanceTier::Medium
        }
    }

    /// Animações simultâneas permitidas.
    pub fn max_concurrent(&self) -> usize {
        match self {
            PerformanceTier::Low => 2,
            PerformanceTier::Medium => 4,
            PerformanceTier::High => 8,
        }
    }

    /// Percentual aplicado à duração base.
    fn duration_percent(&self) -> u32 {
        match self {
            PerformanceTier::Low => 50,
            PerformanceTier::Medium => 80,
            PerformanceTier::High => 100,
        }
    }

    fn stagger(&self) -> Duration {
        match self {
            PerformanceTier::Low => Duration::from_millis(50),
            PerformanceTier::Medium => Duration::from_millis(80),
            PerformanceTier::High => Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AnimationKind {
    FadeIn,
    SlideUp,
    Scale,
    Stagger,
}

impl AnimationKind {
    fn base_duration(&self) -> Duration {
        match self {
            AnimationKind::FadeIn => Duration::from_millis(600),
            AnimationKind::SlideUp => Duration::from_millis(500),
            AnimationKind::Scale => Duration::from_millis(400),
            AnimationKind::Stagger => Duration::from_millis(300),
        }
    }

    fn easing(&self) -> &'static str {
        match self {
            AnimationKind::FadeIn => "ease-out",
            AnimationKind::SlideUp => "cubic-bezier(0.22, 1, 0.36, 1)",
            AnimationKind::Scale => "cubic-bezier(0.34, 1.56, 0.64, 1)",
            AnimationKind::Stagger => "ease-in-out",
        }
    }
}

/// Parâmetros prontos para o componente animar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationPreset {
    pub kind: AnimationKind,
    pub duration: Duration,
    pub easing: &'static str,
    pub stagger: Duration,
    pub parallax: bool,
    pub blur: bool,
}

/// Vaga ocupada por uma animação em curso. Solta ao sair de escopo.
#[derive(Debug)]
pub struct AnimationPermit {
    _permit: OwnedSemaphorePermit,
}

/// Escolhe presets pelo tier do dispositivo e limita animações simultâneas.
#[derive(Clone)]
pub struct AnimationOptimizer {
    tier: PerformanceTier,
    reduced_motion: bool,
    enabled: bool,
    slots: Arc<Semaphore>,
}

impl AnimationOptimizer {
    pub fn new(caps: &Capabilities) -> Self {
        let tier = PerformanceTier::detect(&caps.device);
        debug!("animação: tier {tier:?}");
        Self {
            tier,
            reduced_motion: caps.device.reduced_motion,
            enabled: !caps.is_headless(),
            slots: Arc::new(Semaphore::new(tier.max_concurrent())),
        }
    }

    pub fn tier(&self) -> PerformanceTier {
        self.tier
    }

    pub fn reduced_motion(&self) -> bool {
        self.reduced_motion
    }

    pub fn preset(&self, kind: AnimationKind) -> AnimationPreset {
        if self.reduced_motion {
            return AnimationPreset {
                kind,
                duration: Duration::ZERO,
                easing: "linear",
                stagger: Duration::ZERO,
                parallax: false,
                blur: false,
            };
        }

        let high = self.tier == PerformanceTier::High;
        AnimationPreset {
            kind,
            duration: kind.base_duration() * self.tier.duration_percent() / 100,
            easing: kind.easing(),
            stagger: self.tier.stagger(),
            parallax: high,
            blur: high,
        }
    }

    /// Reserva uma vaga. `None` quando o limite do tier foi atingido ou
    /// não há página para animar.
    pub fn try_start(&self) -> Option<AnimationPermit> {
        if !self.enabled {
            return None;
        }
        match self.slots.clone().try_acquire_owned() {
            Ok(permit) => Some(AnimationPermit { _permit: permit }),
            Err(_) => {
                debug!("animação descartada: {} em curso", self.tier.max_concurrent());
                None
            }
        }
    }

    pub fn running(&self) -> usize {
        self.tier.max_concurrent() - self.slots.available_permits()
    }
}
