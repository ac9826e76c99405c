//! 日志初始化模块

use crate::config::LogConfig;

/// # Brief
/// 初始化全局 tracing 订阅器
///
/// `RUST_LOG` 环境变量优先于配置中的级别。重复调用不会 panic，
/// 已存在全局订阅器时返回 false。
///
/// # Arguments
/// * `config` - 日志配置
///
/// # Returns
/// 本次调用是否成功安装了订阅器
pub fn init_logging(config: &LogConfig) -> bool {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(fmt::layer().json().with_target(config.with_target))
            .try_init()
            .is_ok()
    } else {
        registry
            .with(fmt::layer()
                .with_target(config.with_target)
                .with_file(true)
                .with_line_number(true))
            .try_init()
            .is_ok()
    };
    if installed {
        tracing::debug!(level = %config.level, json = config.json, "logging initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LogConfig::default();
        let _ = init_logging(&config);
        assert!(!init_logging(&config));
    }
}
