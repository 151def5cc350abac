#[cfg(test)]
mod common;
#[cfg(test)]
mod test_eval;
#[cfg(test)]
mod test_inherit;
#[cfg(test)]
mod test_render;
#[cfg(test)]
mod test_scope;
