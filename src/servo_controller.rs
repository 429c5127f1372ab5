use std::io::Error as IoError;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::SerialPortBuilderExt;
use tokio_util::codec::Framed;

use crate::rig::PanTiltMechanism;
use crate::servo_codec::{CmdResp, LineCodec};
use crate::servo_ctrl::ServoCtrl;
use crate::{Error, Setting};

/// Pan/tilt servo board speaking the line protocol
pub struct ServoController<T> {
    servo_control: Framed<T, LineCodec>,
    command_timeout: Duration,
    trys: usize,

    current: Setting,
}

pub type SerialServoController = ServoController<tokio_serial::SerialStream>;

impl SerialServoController {
    pub fn open<'a>(
        path: impl Into<std::borrow::Cow<'a, str>>,
        baud_rate: u32,
        command_timeout: Duration,
    ) -> Result<Self, Error> {
        let port = tokio_serial::new(path, baud_rate)
            .open_native_async()
            .map_err(|e| Error::Mechanism(e.into()))?;
        Ok(Self::new(port, command_timeout))
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> ServoController<T> {
    pub fn new(io: T, command_timeout: Duration) -> Self {
        Self {
            servo_control: Framed::new(io, LineCodec),
            command_timeout,
            trys: 1,
            // the board powers up centered
            current: Setting::CENTER,
        }
    }

    /// Send attempts per command
    pub fn with_trys(mut self, trys: usize) -> Self {
        self.trys = trys.max(1);
        self
    }

    async fn get_result(&mut self) -> Result<(), IoError> {
        use std::io::ErrorKind;
        match tokio::time::timeout(self.command_timeout, self.servo_control.next()).await {
            Ok(Some(r)) => match r {
                Ok(CmdResp::Ok) => Ok(()),
                Ok(CmdResp::Err(e)) => Err(IoError::new(
                    ErrorKind::Other,
                    format!("Command error: {e}"),
                )),
                Err(e) => Err(e),
            },
            Ok(None) => Err(IoError::new(
                ErrorKind::UnexpectedEof,
                "Unexpected end of stream",
            )),
            Err(_e) => Err(IoError::new(ErrorKind::TimedOut, "Servo resp timeout")),
        }
    }

    pub async fn execute(&mut self, cmd: ServoCtrl) -> Result<(), Error> {
        let mut ctrys = self.trys;
        tracing::trace!("Sending {:?}...", cmd);
        loop {
            if let Err(e) = self.servo_control.send(cmd.clone()).await {
                ctrys -= 1;
                if ctrys == 0 {
                    tracing::error!("Failed to send {:?}: {}", cmd, e);
                    return Err(Error::Mechanism(e));
                }
            } else {
                break;
            }
        }

        tracing::trace!("Waiting conformation");
        self.get_result().await.map_err(|e| {
            tracing::error!("Servo board rejected {:?}: {}", cmd, e);
            Error::Mechanism(e)
        })
    }

    pub async fn center(&mut self) -> Result<(), Error> {
        self.execute(ServoCtrl::Center).await?;
        self.current = Setting::CENTER;
        Ok(())
    }

    pub async fn test_connection(&mut self) -> Result<(), Error> {
        self.execute(ServoCtrl::Raw("?".to_owned())).await
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> PanTiltMechanism for ServoController<T> {
    async fn move_absolute(&mut self, setting: Setting) -> Result<(), Error> {
        self.execute(ServoCtrl::Move {
            pan: setting.pan_percent,
            tilt: setting.tilt_percent,
        })
        .await?;
        self.current = setting;
        Ok(())
    }

    async fn move_relative(&mut self, delta: Setting) -> Result<(), Error> {
        self.move_absolute(self.current + delta).await
    }

    fn current_setting(&self) -> Setting {
        self.current
    }
}

#[cfg(test)]
mod test {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use super::*;

    /// Fake board: answers every line with `ok`, except lines starting with `M P1`
    async fn fake_board(io: tokio::io::DuplexStream) -> Vec<String> {
        let (rd, mut wr) = tokio::io::split(io);
        let mut lines = BufReader::new(rd).lines();
        let mut received = vec![];
        while let Ok(Some(line)) = lines.next_line().await {
            let resp: &[u8] = if line.starts_with("M P1") {
                b"error: out of range\n"
            } else {
                b"ok\n"
            };
            received.push(line);
            if wr.write_all(resp).await.is_err() {
                break;
            }
        }
        received
    }

    #[tokio::test]
    async fn relative_moves_become_absolute() {
        let (host, board) = tokio::io::duplex(256);
        let board = tokio::spawn(fake_board(board));

        let mut ctrl = ServoController::new(host, Duration::from_millis(500));
        ctrl.move_absolute(Setting::new(40.0, 60.0)).await.unwrap();
        ctrl.move_relative(Setting::new(2.5, -0.5)).await.unwrap();
        ctrl.center().await.unwrap();
        assert_eq!(ctrl.current_setting(), Setting::CENTER);
        drop(ctrl);

        let received = board.await.unwrap();
        assert_eq!(received, vec!["M P40.00 T60.00", "M P42.50 T59.50", "C"]);
    }

    #[tokio::test]
    async fn rejected_command_keeps_setting() {
        let (host, board) = tokio::io::duplex(256);
        tokio::spawn(fake_board(board));

        let mut ctrl = ServoController::new(host, Duration::from_millis(500));
        let r = ctrl.move_absolute(Setting::new(150.0, 50.0)).await;
        assert!(matches!(r, Err(Error::Mechanism(_))));
        assert_eq!(ctrl.current_setting(), Setting::CENTER);
    }

    #[tokio::test]
    async fn silent_board_times_out() {
        let (host, _board) = tokio::io::duplex(256);

        let mut ctrl = ServoController::new(host, Duration::from_millis(20));
        match ctrl.test_connection().await {
            Err(Error::Mechanism(e)) => assert_eq!(e.kind(), std::io::ErrorKind::TimedOut),
            _ => panic!("timeout expected"),
        }
    }
}
