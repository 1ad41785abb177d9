//! Paths addressing records, such as `Container[1]/Item[0]`.
//!
//! Each step names a record kind and an index among the current structure's
//! instances of it. Pooled kinds are indexed within the owner's window.

use nom::{
	bytes::complete::take_till1,
	character::complete::{
		char,
		space0,
		u32 as decimal
	},
	combinator::{
		all_consuming,
		map_res
	},
	IResult,
	multi::separated_list1,
	sequence::{
		delimited,
		pair,
		terminated
	}
};

use std::{
	fmt,
	str::FromStr
};

use thiserror::Error;

use crate::{
	field::NodeId,
	kind::SubstructureKind,
	resource::Resource
};

#[derive(Debug, Eq, Error, PartialEq)]
pub enum SelectorError {
	#[error("malformed selector {0:?}")]
	Syntax(String),
	#[error("step {step}: no {kind} [{index}]")]
	NotFound {
		step: usize,
		kind: SubstructureKind,
		index: u32,
	},
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Step {
	pub kind: SubstructureKind,
	pub index: u32,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Selector {
	steps: Vec<Step>,
}

fn kind_name(input: &str) -> IResult<&str, SubstructureKind> {
	map_res(take_till1(|c: char| c == '[' || c == '/'), |name: &str| {
		SubstructureKind::from_name(name).ok_or(())
	})(input)
}

fn step(input: &str) -> IResult<&str, Step> {
	let (rest, (kind, index)) = pair(
		kind_name,
		delimited(terminated(char('['), space0), terminated(decimal, space0), char(']'))
	)(input)?;

	Ok((rest, Step {
		kind: kind,
		index: index,
	}))
}

fn steps(input: &str) -> IResult<&str, Vec<Step>> {
	all_consuming(separated_list1(delimited(space0, char('/'), space0), step))(input)
}

impl Selector {
	pub fn steps(&self) -> &[Step] {
		&self.steps
	}

	/// The selector one step up, `None` at the root
	pub fn parent(&self) -> Option<Selector> {
		let (_, init) = self.steps.split_last()?;
		Some(Selector {
			steps: init.to_vec(),
		})
	}

	/// Follows the path from the resource root
	pub fn resolve(&self, resource: &Resource) -> Result<NodeId, SelectorError> {
		let mut current = resource.root_id();
		for (i, step) in self.steps.iter().enumerate() {
			let not_found = SelectorError::NotFound {
				step: i,
				kind: step.kind,
				index: step.index,
			};
			current = resource.instances(current, step.kind)
				.ok()
				.and_then(|ids| ids.get(step.index as usize).copied())
				.ok_or(not_found)?;
		}

		Ok(current)
	}
}

impl FromStr for Selector {
	type Err = SelectorError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim().trim_matches('/');
		if trimmed.is_empty() {
			return Ok(Selector::default());
		}

		match steps(trimmed) {
			Ok((_, steps)) => Ok(Selector {
				steps: steps,
			}),
			Err(_) => Err(SelectorError::Syntax(s.to_string())),
		}
	}
}

impl fmt::Display for Selector {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self.steps.iter()
			.map(|s| format!("{}[{}]", s.kind, s.index))
			.collect();
		f.write_str(&parts.join("/"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{
		fixture,
		resolve_test,
		Fixture
	};

	#[test]
	fn test_parse() {
		let s: Selector = "Container[1] / Item[ 0 ]".parse().unwrap();
		assert_eq!(s.steps(), &[
			Step {
				kind: SubstructureKind::Container,
				index: 1,
			},
			Step {
				kind: SubstructureKind::Item,
				index: 0,
			},
		]);
		assert_eq!(s.to_string(), "Container[1]/Item[0]");

		assert_eq!("tiled object[2]".parse::<Selector>().unwrap().steps()[0].kind, SubstructureKind::TiledObject);
		assert!("".parse::<Selector>().unwrap().steps().is_empty());

		assert_eq!(s.parent().map(|p| p.to_string()), Some("Container[1]".to_string()));
		assert_eq!(Selector::default().parent(), None);
	}

	#[test]
	fn test_parse_errors() {
		assert!(matches!("Widget[0]".parse::<Selector>(), Err(SelectorError::Syntax(_))));
		assert!(matches!("Container[x]".parse::<Selector>(), Err(SelectorError::Syntax(_))));
		assert!(matches!("Container[0]junk".parse::<Selector>(), Err(SelectorError::Syntax(_))));
	}

	#[test]
	fn test_resolve() {
		let r = resolve_test(&fixture(&Fixture::new(0, &[(0, 1), (1, 2)]))).unwrap();
		let second = r.root().records(SubstructureKind::Container).nth(1).unwrap().id();
		let pooled = r.pool_view(second, SubstructureKind::Item).unwrap();

		let s: Selector = "Container[1]/Item[1]".parse().unwrap();
		assert_eq!(s.resolve(&r), Ok(pooled[1]));

		let missing: Selector = "Container[1]/Item[2]".parse().unwrap();
		assert_eq!(missing.resolve(&r), Err(SelectorError::NotFound {
			step: 1,
			kind: SubstructureKind::Item,
			index: 2,
		}));
	}
}
