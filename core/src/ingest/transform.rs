use retina_flow::{Arity, BoxOperator, ExecutionScope, Flow, Operator};

use crate::{
	context::{IndexContext, Parameters},
	model::ContentElement,
	register_stage, Error,
};

/// Forwards its upstream unchanged.
pub struct PassThroughTransformer {
	name: String,
	input: BoxOperator<ContentElement>,
}

impl PassThroughTransformer {
	pub fn new(name: impl Into<String>, input: BoxOperator<ContentElement>) -> Self {
		Self {
			name: name.into(),
			input,
		}
	}
}

impl Operator<ContentElement> for PassThroughTransformer {
	fn name(&self) -> &str {
		&self.name
	}

	fn arity(&self) -> Arity {
		Arity::Unary
	}

	fn into_flow(self: Box<Self>, scope: &ExecutionScope) -> Flow<ContentElement> {
		self.input.into_flow(scope)
	}
}

fn new_pass_through(
	input: BoxOperator<ContentElement>,
	parameters: &Parameters,
	_context: &IndexContext,
) -> Result<BoxOperator<ContentElement>, Error> {
	Ok(Box::new(PassThroughTransformer::new(parameters.stage(), input)))
}

register_stage!("PassThroughTransformer", Transformer, new_pass_through);
