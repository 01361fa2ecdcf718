pub mod ha_interface;

use std::collections::HashMap;
use lazy_static::lazy_static;
use tokio::sync::RwLock;
use crate::mqtt::ha_interface::HaDiscover;
use crate::{config::{ConfigBases, MqttConfig}, models::DeviceProtocol};
use crate::{get_config_or_panic, CONFIG};
use log::{debug, error, info, warn};
use tokio::sync::mpsc::{error::TrySendError, Receiver, Sender};
use serde::{Serialize, Deserialize};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::time::{Duration, Instant};

pub const TOPIC_PREFIX: &str = "teleinfo2mqtt";

/// Process wide state reported on the management topics
#[derive(Clone)]
pub struct AppStatus {
    pub start_time: Instant,
    pub connected: bool,
    pub connections: u64,
}

impl AppStatus {
    pub fn new() -> Self {
        Self { start_time: Instant::now(), connected: false, connections: 0 }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum TransmissionValueType {
    Now,
}

/// Envelope of one reading, published as JSON
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MeteringData {
    pub id: String,
    pub meter_name: String,
    pub tenant: String,
    pub protocol: DeviceProtocol,
    pub transmission_time: u64,
    pub transmission_type: TransmissionValueType,
    pub metered_time: u64,
    pub metered_values: serde_json::Map<String, serde_json::Value>
}

impl MeteringData {
    pub fn new() -> Self {
        return MeteringData {
            id: "".to_string(),
            tenant: "".to_string(),
            meter_name: "".to_string(),
            protocol: DeviceProtocol::Unknown,
            transmission_time: 0,
            transmission_type: TransmissionValueType::Now,
            metered_time: 0,
            metered_values: serde_json::Map::new()
        };
    }
}

pub struct PublishData {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

/// Request to forward every payload received on `teleinfo2mqtt/<topic>`
pub struct SubscribeData {
    pub topic: String,
    pub sender: Sender<Vec<u8>>
}

pub enum Transmission {
    Metering(MeteringData),
    AutoDiscovery(HaDiscover),
    Subscribe(SubscribeData),
    Publish(PublishData)
}

pub struct MqttManager {
    rx: Receiver<Transmission>,
    exit_thread: bool,
    client: AsyncClient,
}

pub struct Callbacks {
    calls: HashMap<String, Vec<Sender<Vec<u8>>>>,
}

impl Callbacks {
    pub fn new() -> Self {
        return Callbacks { calls: HashMap::new() };
    }

    pub fn insert(&mut self, topic: String, callback: Sender<Vec<u8>>) {
        debug!("Adding callback to topic {topic}");
        self.calls.entry(topic).or_default().push(callback);
    }

    pub fn senders(&self, topic: &str) -> Vec<Sender<Vec<u8>>> {
        self.calls.get(topic).cloned().unwrap_or_default()
    }

    pub fn get_topics(&self) -> Vec<String> {
        return self.calls.keys().cloned().collect();
    }
}

/// Hands a received payload to every callback of the topic.
///
/// Never waits on a callback: the event loop is the only one draining the
/// client queue, a busy reader drops the payload instead.
fn forward(topic: &str, senders: Vec<Sender<Vec<u8>>>, payload: &[u8]) {
    if senders.is_empty() {
        debug!("Send for unknown topic {topic}");
        return;
    }

    for call in senders {
        debug!("Sending {} bytes to callback of {topic}", payload.len());
        match call.try_send(payload.to_vec()) {
            Ok(()) => {},
            Err(TrySendError::Full(_)) => warn!("Callback of {topic} is busy, dropping {} bytes", payload.len()),
            Err(TrySendError::Closed(_)) => error!("Callback of {topic} is gone"),
        }
    }
}

lazy_static! {
    pub static ref CALLBACKS: RwLock<Callbacks> = RwLock::new(Callbacks::new());
    pub static ref APP_STATUS: RwLock<AppStatus> = RwLock::new(AppStatus::new());
}

fn qos_from_u8(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

impl MqttManager {
    pub fn new() -> (Self, Sender<Transmission>) {
        let config = get_config_or_panic!("mqtt", ConfigBases::Mqtt);
        Self::with_config(&config)
    }

    pub fn with_config(config: &MqttConfig) -> (Self, Sender<Transmission>) {
        let (mtx, mrx) = tokio::sync::mpsc::channel(100);

        info!("MQTT connection starting up");
        let mut mqttoptions = MqttOptions::new(config.client_name.clone(), config.host.clone(), config.port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        mqttoptions.set_credentials(config.user.clone(), config.pass.clone());

        let (client, mut eventloop) = AsyncClient::new(mqttoptions, 10);

        // Spawn a new task to handle the incoming data
        let reconnect_c = client.clone();
        tokio::spawn(async move {
            info!("MQTT Eventloop started");
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(p))) => {
                        debug!("Received {} bytes on {}", p.payload.len(), p.topic);
                        let senders = CALLBACKS.read().await.senders(&p.topic);
                        forward(&p.topic, senders, &p.payload);
                    },
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected, resubscribing everything");
                        {
                            let mut app_status = APP_STATUS.write().await;
                            app_status.connected = true;
                            app_status.connections += 1;
                        }

                        /* We are connected, resubscribe to everything */
                        let topics = CALLBACKS.read().await.get_topics();
                        for topic in topics {
                            let client_clone = reconnect_c.clone();
                            tokio::spawn(async move {
                                if let Err(e) = client_clone.subscribe(topic.clone(), QoS::AtLeastOnce).await {
                                    error!("Resubscribing {topic} failed: {e}");
                                }
                            });
                        }
                    },
                    Ok(_) => {},
                    Err(e) => {
                        error!("Error in MQTT {:?}, reconnecting ", e);
                        APP_STATUS.write().await.connected = false;
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        return (MqttManager {
            client: client,
            rx: mrx,
            exit_thread: false,
        }, mtx);
    }

    pub async fn start_thread(&mut self) {
        while !self.exit_thread {
            let Some(transmission) = self.rx.recv().await else {
                debug!("Reading returned none, we exit now");
                self.exit_thread = true;
                continue;
            };

            match transmission {
                Transmission::Metering(data) => self.publish_metering(data).await,
                Transmission::AutoDiscovery(disc) => {
                    match serde_json::to_string(&disc) {
                        Ok(payload) => {
                            if let Err(e) = self.client.publish(disc.discover_topic.clone(), QoS::AtLeastOnce, true, payload).await {
                                error!("Error publishing discovery: {}", e);
                            }
                        }
                        Err(e) => { error!("Unable to serialize discovery: {}", e); }
                    }
                }
                Transmission::Subscribe(subscribe_data) => {
                    let topic = format!("{TOPIC_PREFIX}/{}", subscribe_data.topic);
                    if self.client.subscribe(topic.clone(), QoS::AtLeastOnce).await.is_ok() {
                        CALLBACKS.write().await.insert(topic.clone(), subscribe_data.sender);
                        info!("Registered Callback {topic}");
                    }
                },
                Transmission::Publish(publish_data) => {
                    match self.client.publish(
                        publish_data.topic,
                        qos_from_u8(publish_data.qos),
                        publish_data.retain,
                        publish_data.payload
                    ).await {
                        Err(e) => { error!("Error publishing: {}", e); },
                        Ok(_) => { debug!("Published successfully"); }
                    }
                },
            };
        }

        info!("MQTT thread exit");
    }

    async fn publish_metering(&self, data: MeteringData) {
        info!("Metering data received: {}", data.id);
        let (raw, values) = match (serde_json::to_string(&data), serde_json::to_string(&data.metered_values)) {
            (Ok(raw), Ok(values)) => (raw, values),
            (Err(e), _) | (_, Err(e)) => {
                error!("Unable to serialize metering data {}: {}", data.id, e);
                return;
            }
        };

        match self.client.publish(format!("{TOPIC_PREFIX}/raw"), QoS::AtLeastOnce, false, raw).await {
            Err(e) => { error!("Error sending: {}", e); },
            Ok(_) => { debug!("Send successfully"); }
        }

        let topic = format!("{TOPIC_PREFIX}/devs/{}/{}", data.protocol.to_string(), data.meter_name);
        if let Err(e) = self.client.publish(topic, QoS::AtLeastOnce, false, values).await {
            error!("Error sending: {}", e);
        }
    }
}

pub async fn get_app_status() -> AppStatus {
    APP_STATUS.read().await.clone()
}

pub async fn publish_uptime(mqtt_sender: &Sender<Transmission>) {
    let app_status = get_app_status().await;
    debug!("Uptime {}s, broker connected: {}, connections: {}",
        app_status.uptime_seconds(), app_status.connected, app_status.connections);

    let uptime_publish = PublishData {
        topic: format!("{TOPIC_PREFIX}/mgt/uptime"),
        payload: app_status.uptime_seconds().to_string(),
        qos: 1,
        retain: true,
    };
    let _ = mqtt_sender.send(Transmission::Publish(uptime_publish)).await;
}

pub async fn publish_protocol_count(mqtt_sender: &Sender<Transmission>, protocol: &str, count: u32) {
    let count_publish = PublishData {
        topic: format!("{TOPIC_PREFIX}/mgt/{}/count", protocol),
        payload: count.to_string(),
        qos: 1,
        retain: true,
    };
    let _ = mqtt_sender.send(Transmission::Publish(count_publish)).await;
}
