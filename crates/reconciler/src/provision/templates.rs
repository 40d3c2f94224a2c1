//! Child objects rendered from a Bot.
//!
//! Rendering is pure: nothing here touches the store, so the same functions
//! back both provisioning and the dry-run `render` command.

use std::collections::BTreeMap;

use linebot_core::workload::{
    ConfigMapVolumeSource, Container, ContainerPort, DeploymentSpec, DeploymentStrategy,
    DeploymentStrategyType, EnvVar, HttpGetAction, PodSpec, PodTemplateSpec, Probe, Protocol,
    RestartPolicy, ServicePort, ServiceSpec, ServiceType, Volume, VolumeMount,
};
use linebot_core::{
    Bot, BotExposeType, ConfigMap, Deployment, EventBinding, LabelSelector, ObjectMeta,
    OperatorConfig, Resource, Service,
};
use serde::Serialize;

/// Key of the tunnel client config inside the ConfigMap.
pub const NGROK_CONFIG_KEY: &str = "ngrok.yml";

pub const BOT_CONTAINER: &str = "linebot";
pub const NGROK_CONTAINER: &str = "ngrok";
pub const BOT_PORT: u16 = 8080;
pub const NGROK_PORT: u16 = 4040;

const BOT_PORT_NAME: &str = "bot-http";
const NGROK_PORT_NAME: &str = "ngrok-http";
const CONFIG_VOLUME: &str = "ngrok-config";
const CONFIG_MOUNT_PATH: &str = "/home/ngrok/.ngrok2";
const CONFIG_DEFAULT_MODE: u32 = 0o644;
const BASE_URL_NAME: &str = "callback";
const SECRET_KEY: &str = "channelSecret";
const TOKEN_KEY: &str = "channelToken";

/// Tunnel client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgrokConfig<'a> {
    pub authtoken: &'a str,
}

impl NgrokConfig<'_> {
    /// Render as the YAML file the tunnel process reads.
    pub fn render(&self) -> String {
        format!(
            "web_addr: 0.0.0.0:{NGROK_PORT}\nupdate: false\nlog: stdout\nauthtoken: {}",
            self.authtoken
        )
    }
}

/// Everything provisioned for one Bot, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildObjects {
    pub config_map: ConfigMap,
    pub service: Service,
    pub deployment: Deployment,
    pub event_binding: EventBinding,
}

/// Name of the ConfigMap holding the tunnel config for `bot`.
pub fn config_map_name(bot: &str) -> String {
    format!("ngrok-{bot}-config")
}

fn bot_labels(bot: &Bot) -> BTreeMap<String, String> {
    BTreeMap::from([("bot".to_string(), bot.name().to_string())])
}

fn child_meta(bot: &Bot, name: impl Into<String>) -> ObjectMeta {
    ObjectMeta::new(name, bot.namespace())
}

pub fn render_config_map(bot: &Bot) -> ConfigMap {
    let config = NgrokConfig {
        authtoken: &bot.spec.expose.ngrok_token,
    };
    ConfigMap {
        metadata: child_meta(bot, config_map_name(bot.name())),
        data: BTreeMap::from([(NGROK_CONFIG_KEY.to_string(), config.render())]),
    }
}

pub fn render_service(bot: &Bot) -> Service {
    let expose = &bot.spec.expose;
    let (service_type, external_ips) = match expose.expose_type {
        BotExposeType::Ngrok | BotExposeType::Ingress => (ServiceType::NodePort, Vec::new()),
        BotExposeType::LoadBalancer => {
            (ServiceType::LoadBalancer, expose.load_balance_ips.clone())
        }
    };

    Service {
        metadata: child_meta(bot, bot.name()).with_labels(bot_labels(bot)),
        spec: ServiceSpec {
            service_type,
            selector: bot_labels(bot),
            ports: vec![
                ServicePort {
                    name: BOT_PORT_NAME.to_string(),
                    port: BOT_PORT,
                    protocol: Protocol::Tcp,
                },
                ServicePort {
                    name: NGROK_PORT_NAME.to_string(),
                    port: NGROK_PORT,
                    protocol: Protocol::Tcp,
                },
            ],
            external_ips,
        },
    }
}

fn liveness(path: &str, port: u16) -> Probe {
    Probe {
        http_get: HttpGetAction {
            path: path.to_string(),
            port,
            scheme: "HTTP".to_string(),
        },
        failure_threshold: 3,
        initial_delay_seconds: 10,
        period_seconds: 30,
        success_threshold: 1,
        timeout_seconds: 3,
    }
}

fn bot_container(bot: &Bot, config: &OperatorConfig) -> Container {
    let secret = &bot.spec.channel_secret_name;
    Container {
        name: BOT_CONTAINER.to_string(),
        image: format!("{}:{}", config.bot_image, bot.spec.version),
        args: vec![
            "--logtostderr".to_string(),
            format!("--v={}", bot.spec.log_level),
        ],
        env: vec![
            EnvVar::from_secret("CHANNEL_SECRET", secret, SECRET_KEY),
            EnvVar::from_secret("CHANNEL_TOKEN", secret, TOKEN_KEY),
            EnvVar::literal("EVENTBINDING_NAME", bot.name()),
            EnvVar::literal("BASE_URL_NAME", BASE_URL_NAME),
            EnvVar::literal("NAMESPACE", bot.namespace()),
        ],
        ports: vec![ContainerPort {
            name: BOT_PORT_NAME.to_string(),
            container_port: BOT_PORT,
            protocol: Protocol::Tcp,
        }],
        liveness_probe: Some(liveness("/healthz", BOT_PORT)),
        ..Container::default()
    }
}

fn ngrok_container(bot: &Bot, config: &OperatorConfig) -> Container {
    Container {
        name: NGROK_CONTAINER.to_string(),
        image: format!("{}:{}", config.ngrok_image, bot.spec.version),
        command: vec![
            "./ngrok".to_string(),
            "http".to_string(),
            BOT_PORT.to_string(),
        ],
        ports: vec![ContainerPort {
            name: NGROK_PORT_NAME.to_string(),
            container_port: NGROK_PORT,
            protocol: Protocol::Tcp,
        }],
        liveness_probe: Some(liveness("/api/tunnels", NGROK_PORT)),
        volume_mounts: vec![VolumeMount {
            name: CONFIG_VOLUME.to_string(),
            mount_path: CONFIG_MOUNT_PATH.to_string(),
        }],
        ..Container::default()
    }
}

pub fn render_deployment(bot: &Bot, config: &OperatorConfig) -> Deployment {
    let labels = bot_labels(bot);
    Deployment {
        metadata: child_meta(bot, bot.name()).with_labels(labels.clone()),
        spec: DeploymentSpec {
            replicas: 1,
            selector: LabelSelector {
                match_labels: labels.clone(),
            },
            strategy: DeploymentStrategy {
                strategy_type: DeploymentStrategyType::Recreate,
            },
            template: PodTemplateSpec {
                metadata: ObjectMeta::default().with_labels(labels),
                spec: PodSpec {
                    service_account_name: config.service_account_name.clone(),
                    containers: vec![bot_container(bot, config), ngrok_container(bot, config)],
                    restart_policy: RestartPolicy::Always,
                    volumes: vec![Volume {
                        name: CONFIG_VOLUME.to_string(),
                        config_map: ConfigMapVolumeSource {
                            name: config_map_name(bot.name()),
                            default_mode: CONFIG_DEFAULT_MODE,
                        },
                    }],
                },
            },
        },
    }
}

/// The bot's own routing table, labeled so that Events selecting the bot find it.
pub fn render_event_binding(bot: &Bot) -> EventBinding {
    EventBinding::new(child_meta(bot, bot.name()).with_labels(bot.selector_labels()))
}

/// Render all four children of `bot`.
pub fn render_children(bot: &Bot, config: &OperatorConfig) -> ChildObjects {
    ChildObjects {
        config_map: render_config_map(bot),
        service: render_service(bot),
        deployment: render_deployment(bot, config),
        event_binding: render_event_binding(bot),
    }
}
