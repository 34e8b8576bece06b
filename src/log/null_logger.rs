/*!

A "logger" for builds without the `logging` feature. Nothing is written anywhere, but the public
API in `crate::log` keeps working and `log::max_level()` still tracks the most verbose configured level.

*/

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn is_installed(&self) -> bool {
        log::max_level() == self.max_level()
    }

    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.max_level());
    }
}
