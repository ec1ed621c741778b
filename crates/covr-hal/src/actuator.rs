//! The `ColumnActuator` trait for the motion platform that carries the
//! column.
//!
//! The platform exposes two independent slider-style axis commands, a
//! go-to-point command and a mode toggle between the two.  Navigation only
//! ever talks to this trait, so the physical driver can be replaced by
//! [`SimColumn`][crate::sim::SimColumn] in tests.

use covr_types::{ActuationMode, AxisCommand, CovrError, Vec3};

/// The movable physical proxy's motion platform.
pub trait ColumnActuator: Send {
    /// Stable identifier for this platform, e.g. `"column"`.
    fn id(&self) -> &str;

    /// Live world position of the column.
    fn position(&self) -> Vec3;

    /// Currently active actuation mode.
    fn mode(&self) -> ActuationMode;

    /// Switch between direct positioning and velocity control.
    ///
    /// # Errors
    ///
    /// Returns [`CovrError::ActuatorFault`] if the platform refuses the switch.
    fn set_mode(&mut self, mode: ActuationMode) -> Result<(), CovrError>;

    /// Apply the two axis commands.  Only meaningful in velocity mode.
    ///
    /// # Errors
    ///
    /// Returns [`CovrError::ActuatorFault`] if the command cannot be applied.
    fn drive(&mut self, command: AxisCommand) -> Result<(), CovrError>;

    /// Most recently applied axis commands.
    fn axis_command(&self) -> AxisCommand;

    /// Hand the platform a destination point.  Only meaningful in direct mode.
    ///
    /// # Errors
    ///
    /// Returns [`CovrError::ActuatorFault`] if the destination is rejected.
    fn go_to(&mut self, destination: Vec3) -> Result<(), CovrError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process platform used only for tests.
    struct MockColumn {
        position: Vec3,
        mode: ActuationMode,
        command: AxisCommand,
        estop: bool,
    }

    impl ColumnActuator for MockColumn {
        fn id(&self) -> &str {
            "mock_column"
        }

        fn position(&self) -> Vec3 {
            self.position
        }

        fn mode(&self) -> ActuationMode {
            self.mode
        }

        fn set_mode(&mut self, mode: ActuationMode) -> Result<(), CovrError> {
            self.mode = mode;
            Ok(())
        }

        fn drive(&mut self, command: AxisCommand) -> Result<(), CovrError> {
            if self.estop {
                return Err(CovrError::ActuatorFault {
                    component: self.id().to_string(),
                    details: "emergency stop engaged".to_string(),
                });
            }
            self.command = command;
            Ok(())
        }

        fn axis_command(&self) -> AxisCommand {
            self.command
        }

        fn go_to(&mut self, destination: Vec3) -> Result<(), CovrError> {
            self.position = destination;
            Ok(())
        }
    }

    #[test]
    fn mock_column_drive_and_go_to() {
        let mut col = MockColumn {
            position: Vec3::ZERO,
            mode: ActuationMode::Velocity,
            command: AxisCommand::ZERO,
            estop: false,
        };
        col.drive(AxisCommand::new(0.5, -0.5)).unwrap();
        assert_eq!(col.axis_command(), AxisCommand::new(0.5, -0.5));

        col.set_mode(ActuationMode::Direct).unwrap();
        col.go_to(Vec3::new(1.0, 0.0, 2.0)).unwrap();
        assert_eq!(col.mode(), ActuationMode::Direct);
        assert_eq!(col.position(), Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn mock_column_fault_surfaces_as_error() {
        let mut col = MockColumn {
            position: Vec3::ZERO,
            mode: ActuationMode::Velocity,
            command: AxisCommand::ZERO,
            estop: true,
        };
        let err = col.drive(AxisCommand::new(1.0, 0.0)).unwrap_err();
        assert!(matches!(err, CovrError::ActuatorFault { .. }));
    }
}
