pub(crate) mod answer_ledger;
pub(crate) mod category_timer;
#[cfg(test)]
pub(crate) mod fixtures;
pub(crate) mod scoring;
pub(crate) mod session_machine;
pub(crate) mod tryout;
