use crate::config::GameConfig;
use shared::{BallSnapshot, Direction, PaddleSnapshot, Side, Vector2};

///Represents one player's paddle. `y` is the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Paddle {
    pub y: f32,
    pub height: f32,
    pub width: f32,
    ///Travel speed in units per second.
    pub speed: f32,
    pub moving: Direction,
}

impl Paddle {
    ///Returns a stopped paddle vertically centered on the court.
    pub fn centered(config: &GameConfig) -> Self {
        Paddle {
            y: (config.court_height - config.paddle_height) / 2.0,
            height: config.paddle_height,
            width: config.paddle_width,
            speed: config.paddle_speed,
            moving: Direction::Stop,
        }
    }

    ///Current vertical velocity derived from the movement intent.
    pub fn velocity_y(&self) -> f32 {
        self.speed * self.moving.sign()
    }

    ///Moves the paddle along its intent and clamps it to the court.
    pub fn step(&mut self, dt: f32, court_height: f32) {
        self.y += self.velocity_y() * dt;
        self.y = self.y.clamp(0.0, (court_height - self.height).max(0.0));
    }

    ///True when `y` lies on the paddle face, edges included.
    pub fn covers(&self, y: f32) -> bool {
        y >= self.y && y <= self.y + self.height
    }

    pub fn snapshot(&self) -> PaddleSnapshot {
        PaddleSnapshot {
            y: self.y,
            height: self.height,
        }
    }
}

///Horizontal extent of a paddle, derived from its side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaddleSpan {
    pub left: f32,
    pub right: f32,
}

impl PaddleSpan {
    pub fn for_side(side: Side, config: &GameConfig) -> Self {
        match side {
            Side::A => PaddleSpan {
                left: config.paddle_offset,
                right: config.paddle_offset + config.paddle_width,
            },
            Side::B => PaddleSpan {
                left: config.court_width - config.paddle_offset - config.paddle_width,
                right: config.court_width - config.paddle_offset,
            },
        }
    }
}

///The match ball.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub position: Vector2,
    ///Velocity in units per second.
    pub velocity: Vector2,
    pub radius: f32,
}

impl Ball {
    pub fn at_rest(position: Vector2, radius: f32) -> Self {
        Ball {
            position,
            velocity: Vector2::ZERO,
            radius,
        }
    }

    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    ///Advances the position by one time-step.
    pub fn integrate(&mut self, dt: f32) {
        self.position.add_assign(&self.velocity.scale(dt));
    }

    ///Reflects off the top and bottom walls and pulls the ball back in bounds.
    ///A ball exactly touching a wall is in bounds and is not reflected.
    ///Returns true if a wall was hit.
    pub fn bounce_walls(&mut self, court_height: f32) -> bool {
        if self.position.y - self.radius < 0.0 {
            self.position.y = self.radius;
            self.velocity.y = self.velocity.y.abs();
            true
        } else if self.position.y + self.radius > court_height {
            self.position.y = court_height - self.radius;
            self.velocity.y = -self.velocity.y.abs();
            true
        } else {
            false
        }
    }

    ///Checks for and resolves a hit against one paddle.
    ///
    ///Only a ball travelling toward the paddle can hit it, so a ball that is
    ///already bouncing away is never reflected twice. On contact the
    ///horizontal velocity is reflected, a share of the paddle's vertical
    ///velocity is added, and the speed is clamped to `max_speed`.
    ///
    ///Detection is discrete: a ball fast enough to cross the whole paddle
    ///span within one tick passes through it.
    pub fn bounce_paddle(
        &mut self,
        paddle: &Paddle,
        side: Side,
        span: PaddleSpan,
        spin_factor: f32,
        max_speed: f32,
    ) -> bool {
        let approaching = match side {
            Side::A => self.velocity.x < 0.0,
            Side::B => self.velocity.x > 0.0,
        };
        if !approaching {
            return false;
        }

        let overlaps_x =
            self.position.x - self.radius <= span.right && self.position.x + self.radius >= span.left;
        if !overlaps_x || !paddle.covers(self.position.y) {
            return false;
        }

        match side {
            Side::A => {
                self.velocity.x = self.velocity.x.abs();
                self.position.x = self.position.x.max(span.right + self.radius);
            }
            Side::B => {
                self.velocity.x = -self.velocity.x.abs();
                self.position.x = self.position.x.min(span.left - self.radius);
            }
        }
        self.velocity.y += paddle.velocity_y() * spin_factor;
        self.velocity.clamp_length_mut(max_speed);
        true
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.velocity.is_finite()
    }

    pub fn snapshot(&self) -> BallSnapshot {
        BallSnapshot {
            x: self.position.x,
            y: self.position.y,
            radius: self.radius,
        }
    }
}
