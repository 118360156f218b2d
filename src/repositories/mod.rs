pub(crate) mod attempts;
pub(crate) mod catalog;
pub(crate) mod health;
pub(crate) mod responses;
pub(crate) mod results;
pub(crate) mod users;
