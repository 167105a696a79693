use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::time::Duration;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

use crate::capability::{Capabilities, ConnectionProbe};
use crate::lock;

/// `navigator.connection.effectiveType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    #[serde(rename = "unknown")]
    Unknown,
}

impl EffectiveType {
    /// Valores fora da lista viram `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "slow-2g" => EffectiveType::Slow2g,
            "2g" => EffectiveType::TwoG,
            "3g" => EffectiveType::ThreeG,
            "4g" => EffectiveType::FourG,
            _ => EffectiveType::Unknown,
        }
    }
}

/// Estado da conexão observado.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConnectionInfo {
    pub effective_type: EffectiveType,
    pub downlink_mbps: f64,
    pub rtt_ms: u32,
    pub save_data: bool,
    pub online: bool,
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            effective_type: EffectiveType::Unknown,
            downlink_mbps: 10.0,
            rtt_ms: 50,
            save_data: false,
            online: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ImageQuality {
    Low,
    Medium,
    High,
}

impl ImageQuality {
    /// Parâmetro `q` enviado ao servidor de imagens.
    pub fn value(&self) -> u8 {
        match self {
            ImageQuality::Low => 50,
            ImageQuality::Medium => 75,
            ImageQuality::High => 90,
        }
    }
}

/// Política derivada da conexão.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetworkPolicy {
    pub image_quality: ImageQuality,
    pub request_timeout: Duration,
    pub chunk_size: usize,
    pub prefetch: bool,
}

impl NetworkPolicy {
    pub fn for_connection(info: &ConnectionInfo) -> Self {
        if info.save_data {
            return Self::slow();
        }
        match info.effective_type {
            EffectiveType::Slow2g | EffectiveType::TwoG => Self::slow(),
            EffectiveType::ThreeG => Self {
                image_quality: ImageQuality::Medium,
                request_timeout: Duration::from_secs(15),
                chunk_size: 64 * 1024,
                prefetch: false,
            },
            EffectiveType::FourG | EffectiveType::Unknown => Self {
                image_quality: ImageQuality::High,
                request_timeout: Duration::from_secs(8),
                chunk_size: 256 * 1024,
                prefetch: true,
            },
        }
    }

    fn slow() -> Self {
        Self {
            image_quality: ImageQuality::Low,
            request_timeout: Duration::from_secs(30),
            chunk_size: 16 * 1024,
            prefetch: false,
        }
    }
}

/// Eventos `online`/`offline`/`change` do navegador.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConnectionEvent {
    Online,
    Offline,
    Changed(ConnectionInfo),
}

type ReconnectTask = Box<dyn FnOnce() + Send>;

struct NetworkShared {
    probe: Option<Arc<dyn ConnectionProbe>>,
    prefer_save_data: bool,
    info: Mutex<ConnectionInfo>,
    pending: Mutex<VecDeque<ReconnectTask>>,
    policy_tx: watch::Sender<NetworkPolicy>,
}

/// Acompanha a conexão, publica a política atual e segura tarefas até a
/// volta da rede.
#[derive(Clone)]
pub struct NetworkOptimizer {
    shared: Arc<NetworkShared>,
}

impl NetworkOptimizer {
    pub fn new(caps: &Capabilities) -> Self {
        let prefer_save_data = caps.device.save_data;
        let mut info = caps
            .connection
            .as_ref()
            .map(|c| c.current())
            .unwrap_or_default();
        info.save_data |= prefer_save_data;

        let (policy_tx, _) = watch::channel(NetworkPolicy::for_connection(&info));
        Self {
            shared: Arc::new(NetworkShared {
                probe: caps.connection.clone(),
                prefer_save_data,
                info: Mutex::new(info),
                pending: Mutex::new(VecDeque::new()),
                policy_tx,
            }),
        }
    }

    pub fn info(&self) -> ConnectionInfo {
        *lock(&self.shared.info)
    }

    pub fn is_online(&self) -> bool {
        lock(&self.shared.info).online
    }

    pub fn policy(&self) -> NetworkPolicy {
        *self.shared.policy_tx.borrow()
    }

    /// Recebe a política atual e as mudanças seguintes.
    pub fn subscribe(&self) -> watch::Receiver<NetworkPolicy> {
        self.shared.policy_tx.subscribe()
    }

    pub fn pending(&self) -> usize {
        lock(&self.shared.pending).len()
    }

    /// Roda `task` agora se online; senão guarda até reconectar. Retorna
    /// `true` se rodou imediatamente.
    pub fn queue_on_reconnect(&self, task: impl FnOnce() + Send + 'static) -> bool {
        // Decide sob o lock de `info` para não perder um Online concorrente
        let info = lock(&self.shared.info);
        if info.online {
            drop(info);
            task();
            return true;
        }
        lock(&self.shared.pending).push_back(Box::new(task));
        debug!("rede: tarefa enfileirada até reconectar");
        false
    }

    /// Relê a conexão do probe, se houver.
    pub fn refresh(&self) -> usize {
        match self.shared.probe.as_ref() {
            Some(probe) => self.handle_event(ConnectionEvent::Changed(probe.current())),
            None => 0,
        }
    }

    /// Aplica um evento. Retorna quantas tarefas pendentes foram executadas.
    pub fn handle_event(&self, event: ConnectionEvent) -> usize {
        let (was_online, info) = {
            let mut info = lock(&self.shared.info);
            let was_online = info.online;
            match event {
                ConnectionEvent::Online => info.online = true,
                ConnectionEvent::Offline => info.online = false,
                ConnectionEvent::Changed(new) => {
                    *info = new;
                    info.save_data |= self.shared.prefer_save_data;
                }
            }
            (was_online, *info)
        };

        let policy = NetworkPolicy::for_connection(&info);
        self.shared.policy_tx.send_if_modified(|current| {
            if *current != policy {
                *current = policy;
                true
            } else {
                false
            }
        });

        match (was_online, info.online) {
            (false, true) => {
                info!("rede: conexão restabelecida");
                self.drain_pending()
            }
            (true, false) => {
                info!("rede: offline");
                0
            }
            _ => 0,
        }
    }

    fn drain_pending(&self) -> usize {
        let tasks: Vec<ReconnectTask> = lock(&self.shared.pending).drain(..).collect();
        let count = tasks.len();
        for task in tasks {
            task();
        }
        if count > 0 {
            debug!("rede: {count} tarefas pendentes executadas");
        }
        count
    }

    /// Consome eventos de conexão até o stream acabar ou chegar shutdown.
    pub async fn run<St>(&self, mut events: St, mut shutdown: broadcast::Receiver<()>)
    where
        St: Stream<Item = ConnectionEvent> + Unpin,
    {
        loop {
            tokio::select! {
                event = events.next() => match event {
                    Some(event) => {
                        self.handle_event(event);
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        debug!("rede: loop de eventos encerrado");
    }
}
