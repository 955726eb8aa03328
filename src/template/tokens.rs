//! Standard template token names.

pub const FROM_USER_NAME: &str = "FROM_USERNAME";
pub const FROM_FIRST_NAME: &str = "FROM_FIRSTNAME";
pub const FROM_FULL_NAME: &str = "FROM_FULLNAME";
pub const FROM_EMAIL: &str = "FROM_EMAIL";
pub const USER_ID: &str = "USERID";
pub const USER_NAME: &str = "USERNAME";
pub const FIRST_NAME: &str = "FIRSTNAME";
pub const FULL_NAME: &str = "FULLNAME";
pub const USER_EMAIL: &str = "USEREMAIL";
pub const REQUESTED_URL: &str = "REQUESTEDURL";
pub const URL: &str = "URL";
pub const UTC_DATE_TIME: &str = "UTCDATETIME";
pub const UTC_DATE: &str = "UTCDATE";
pub const DATE_TIME: &str = "DATETIME";
pub const DATE: &str = "DATE";
pub const TIME: &str = "TIME";
pub const TIME_ZONE: &str = "TIMEZONE";
pub const EMAIL: &str = "EMAIL";
pub const COPYRIGHT: &str = "COPYRIGHT";
pub const VERSION: &str = "VERSION";
