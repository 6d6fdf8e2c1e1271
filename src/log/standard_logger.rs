use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

use crate::log::{LogConfiguration, ModuleLogConfiguration};

const APPENDER: &str = "stderr";
// ISO 8601 timestamp, colored level, module target
const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";

impl From<&ModuleLogConfiguration> for Logger {
    fn from(module_config: &ModuleLogConfiguration) -> Self {
        Logger::builder().build(module_config.module.clone(), module_config.level)
    }
}

impl LogConfiguration {
    /// Installs this configuration as the process logger, or swaps it into the
    /// logger installed by an earlier call.
    pub(in crate::log) fn set_config(&mut self) {
        let stderr = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build();
        let builder = self.module_configurations.values().fold(
            Config::builder().appender(Appender::builder().build(APPENDER, Box::new(stderr))),
            |builder, module_config| builder.logger(module_config.into()),
        );
        let root = Root::builder()
            .appender(APPENDER)
            .build(self.global_log_level);

        let config = match builder.build(root) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("invalid log configuration: {error}");
                return;
            }
        };

        match self.root_handle {
            Some(ref handle) => handle.set_config(config),
            None => match log4rs::init_config(config) {
                Ok(handle) => self.root_handle = Some(handle),
                Err(error) => eprintln!("failed to install logger: {error}"),
            },
        }
    }
}
