//! Used when the `logging` feature is off: nothing is installed, but the level is still
//! recorded with the `log` facade so that disabled macros stay cheap.

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.global_log_level);
    }
}
