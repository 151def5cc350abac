#[cfg(test)]
mod common;
#[cfg(test)]
mod test_index;
#[cfg(test)]
mod test_lint;
#[cfg(test)]
mod test_providers;
#[cfg(test)]
mod test_rename;
#[cfg(test)]
mod test_store;
