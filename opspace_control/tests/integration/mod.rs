mod adaptation;
mod model_errors;
mod properties;
mod reaching;
