//! Bit level output.

/// Destination for encoded bits. Bits are appended least significant bit first.
pub trait BitSink
{
  /// Append the low n bits of value ( n <= 32 ).
  fn write_bits( &mut self, n: u8, value: u64 );

  /// Pad with zero bits to the next byte boundary.
  fn align_to_byte( &mut self );

  /// Write 16 bits, least significant first.
  fn write_short( &mut self, value: u16 )
  {
    self.write_bits( 16, value as u64 );
  }

  /// Copy whole bytes. The sink must already be byte aligned.
  fn write_raw_bytes( &mut self, bytes: &[u8] );
}

/// Output bit stream backed by a byte vector.
pub struct BitStream
{
  buffer: u64,
  bits_in_buffer: u8,
  pub bytes: Vec<u8>,
}

impl BitStream
{
  pub fn new( capacity: usize ) -> BitStream
  {
    BitStream
    {
      buffer: 0,
      bits_in_buffer: 0,
      bytes: Vec::with_capacity( capacity )
    }
  }

  /// Number of bits written so far.
  pub fn bit_len( &self ) -> usize
  {
    self.bytes.len() * 8 + self.bits_in_buffer as usize
  }

  /// Pad output with zero bits to n bit boundary where n is power of 2 in range 1,2,4..64, typically n=8.
  pub fn pad( &mut self, n: u8 )
  {
    let w = self.bits_in_buffer % n;
    if w > 0 { self.write_bits( n - w, 0 ); }
  }

  /// Flush bit buffer to bytes.
  pub fn flush( &mut self )
  {
    self.pad( 8 );
    let mut w = self.buffer;
    while self.bits_in_buffer > 0
    {
      self.bytes.push( ( w & 255 ) as u8 );
      w >>= 8;
      self.bits_in_buffer -= 8;
    }
    self.buffer = 0;
  }

  /// Flush and return the bytes.
  pub fn finish( mut self ) -> Vec<u8>
  {
    self.flush();
    self.bytes
  }

  fn save( &mut self, w: u64 )
  {
    self.bytes.extend_from_slice( &w.to_le_bytes() );
  }
}

impl BitSink for BitStream
{
  fn write_bits( &mut self, mut n: u8, mut value: u64 )
  {
    if n == 0 { return; }
    value &= ( 1 << n ) - 1;
    if n + self.bits_in_buffer >= 64
    {
      self.save( value << self.bits_in_buffer | self.buffer );
      let space = 64 - self.bits_in_buffer;
      value >>= space;
      n -= space;
      self.buffer = 0;
      self.bits_in_buffer = 0;
    }
    self.buffer |= value << self.bits_in_buffer;
    self.bits_in_buffer += n;
  }

  fn align_to_byte( &mut self )
  {
    self.pad( 8 );
  }

  fn write_raw_bytes( &mut self, bytes: &[u8] )
  {
    debug_assert!( self.bits_in_buffer % 8 == 0 );
    self.flush();
    self.bytes.extend_from_slice( bytes );
  }
}
