#[cfg(test)]
mod test_format;
#[cfg(test)]
mod test_recovery;
#[cfg(test)]
mod test_visitor;
