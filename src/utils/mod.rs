pub mod attendance_rules;
pub mod auto_checkout;
pub mod db_utils;
