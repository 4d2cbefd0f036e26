/// Response codes, final bit set (IrOBEX 3.2.1)
#[repr(u8)]
#[derive(FromPrimitive, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    Continue = 0x90,
    Ok = 0xA0,
    Created = 0xA1,
    Accepted = 0xA2,
    NonAuthoritativeInfo = 0xA3,
    NoContent = 0xA4,
    ResetContent = 0xA5,
    PartialContent = 0xA6,
    MultipleChoices = 0xB0,
    MovedPermanently = 0xB1,
    MovedTemporarily = 0xB2,
    SeeOther = 0xB3,
    NotModified = 0xB4,
    UseProxy = 0xB5,
    BadRequest = 0xC0,
    Unauthorized = 0xC1,
    PaymentRequired = 0xC2,
    Forbidden = 0xC3,
    NotFound = 0xC4,
    MethodNotAllowed = 0xC5,
    NotAcceptable = 0xC6,
    ProxyAuthenticationRequired = 0xC7,
    RequestTimeout = 0xC8,
    Conflict = 0xC9,
    Gone = 0xCA,
    LengthRequired = 0xCB,
    PreconditionFailed = 0xCC,
    RequestEntityTooLarge = 0xCD,
    RequestUrlTooLarge = 0xCE,
    UnsupportedMediaType = 0xCF,
    InternalServerError = 0xD0,
    NotImplemented = 0xD1,
    BadGateway = 0xD2,
    ServiceUnavailable = 0xD3,
    GatewayTimeout = 0xD4,
    HttpVersionNotSupported = 0xD5,
    DatabaseFull = 0xE0,
    DatabaseLocked = 0xE1,
}

impl ResponseCode {
    /// Decode a response opcode, ignoring the final bit.
    /// Unknown codes are reported as a bad request.
    pub fn from_opcode(opcode: u8) -> Self {
        num::FromPrimitive::from_u8(opcode | 0x80).unwrap_or(ResponseCode::BadRequest)
    }

    pub fn is_continue(self) -> bool {
        self == ResponseCode::Continue
    }

    /// `Ok` and the other 2xx-class success codes
    pub fn is_success(self) -> bool {
        matches!(
            self,
            ResponseCode::Ok | ResponseCode::Created | ResponseCode::Accepted
        )
    }
}
