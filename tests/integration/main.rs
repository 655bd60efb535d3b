mod pipeline;
mod rotation;
mod sink_round_trip;
