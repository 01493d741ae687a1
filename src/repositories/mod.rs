pub(crate) mod catalog;
pub(crate) mod health;
pub(crate) mod participant_answers;
pub(crate) mod participant_categories;
