pub mod insight_hub;
