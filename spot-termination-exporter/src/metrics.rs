pub static TERMINATION_IMMINENT: &str = "aws_instance_termination_imminent";
pub static TERMINATION_IMMINENT_HELP: &str = "Instance is about to be terminated";
pub static TERMINATION_IN: &str = "aws_instance_termination_in";
pub static TERMINATION_IN_HELP: &str = "Instance will be terminated in";

/// Labels identifying the instance; shared by both metrics.
pub const INSTANCE_LABELS: [&str; 4] = ["availability_zone", "hostname", "instance_id", "instance_type"];
/// Additional label of `TERMINATION_IMMINENT` carrying the announced action.
pub const ACTION_LABEL: &str = "instance_action";

/// Label names of `TERMINATION_IMMINENT`.
pub fn termination_imminent_labels() -> Vec<String> {
    let mut labels = termination_in_labels();
    labels.push(ACTION_LABEL.to_string());
    labels
}

/// Label names of `TERMINATION_IN`.
pub fn termination_in_labels() -> Vec<String> { INSTANCE_LABELS.iter().map(|l| l.to_string()).collect() }
